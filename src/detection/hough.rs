use image::GrayImage;
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::models::Circle;
use crate::params::HoughConfig;

/// Center candidate with its accumulator support.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    x: u32,
    y: u32,
    votes: u32,
}

/// Gradient Hough circle transform.
///
/// Edges come from a Canny pass with thresholds `(param1/2, param1)`; each
/// edge pixel votes for possible centers along its Sobel gradient direction
/// (both ways) into an accumulator downscaled by `dp`. Centers are local
/// maxima with at least `param2` votes, thinned so no two are closer than
/// `min_dist`, strongest first. Each center's radius is the mode of the edge
/// distances falling inside `[min_radius, max_radius]`.
///
/// `min_radius == 0` means no lower bound; `max_radius == 0` means "bounded
/// by the image size". An empty result is a valid "no circle located"
/// outcome, not an error.
pub fn hough_circles(
    image: &GrayImage,
    cfg: &HoughConfig,
    min_radius: u32,
    max_radius: u32,
) -> Vec<Circle> {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let min_r = min_radius.max(1);
    let max_r = if max_radius == 0 { w.max(h) } else { max_radius };
    if max_r < min_r {
        return Vec::new();
    }

    let high = cfg.param1.max(1) as f32;
    let edges = canny(image, high / 2.0, high);
    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);

    let dp = cfg.dp.max(1);
    let acc_w = w.div_ceil(dp);
    let acc_h = h.div_ceil(dp);
    let mut acc = vec![0u32; (acc_w * acc_h) as usize];
    let mut edge_points: Vec<(u32, u32)> = Vec::new();

    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        let dx = gx.get_pixel(x, y)[0] as f64;
        let dy = gy.get_pixel(x, y)[0] as f64;
        let mag = (dx * dx + dy * dy).sqrt();
        if mag < 1.0 {
            continue;
        }
        edge_points.push((x, y));

        let (ux, uy) = (dx / mag, dy / mag);
        for dir in [1.0, -1.0] {
            let mut r = min_r;
            while r <= max_r {
                let cx = x as f64 + dir * ux * r as f64;
                let cy = y as f64 + dir * uy * r as f64;
                if cx >= 0.0 && cy >= 0.0 && (cx as u32) < w && (cy as u32) < h {
                    let idx = (cy as u32 / dp) * acc_w + cx as u32 / dp;
                    acc[idx as usize] += 1;
                }
                r += dp;
            }
        }
    }

    let threshold = cfg.param2.max(1);
    let mut candidates: Vec<Candidate> = Vec::new();
    for ay in 0..acc_h {
        for ax in 0..acc_w {
            let votes = acc[(ay * acc_w + ax) as usize];
            if votes >= threshold && is_local_max(&acc, acc_w, acc_h, ax, ay) {
                candidates.push(Candidate {
                    x: (ax * dp + dp / 2).min(w - 1),
                    y: (ay * dp + dp / 2).min(h - 1),
                    votes,
                });
            }
        }
    }
    candidates.sort_by(|a, b| b.votes.cmp(&a.votes));

    // Greedy suppression, strongest candidate first.
    let min_dist = cfg.min_dist.max(1) as f64;
    let mut kept: Vec<Candidate> = Vec::new();
    for c in candidates {
        let far_enough = kept
            .iter()
            .all(|k| point_distance(k.x, k.y, c.x, c.y) >= min_dist);
        if far_enough {
            kept.push(c);
        }
    }

    kept.iter()
        .filter_map(|c| {
            estimate_radius(&edge_points, c.x, c.y, min_r, max_r)
                .map(|r| Circle::new(c.x as f64, c.y as f64, r as f64))
        })
        .collect()
}

/// Strict-on-later-neighbors local maximum over the 3x3 neighborhood, so
/// plateaus yield a single candidate.
fn is_local_max(acc: &[u32], acc_w: u32, acc_h: u32, ax: u32, ay: u32) -> bool {
    let center = acc[(ay * acc_w + ax) as usize];
    for ny in ay.saturating_sub(1)..=(ay + 1).min(acc_h - 1) {
        for nx in ax.saturating_sub(1)..=(ax + 1).min(acc_w - 1) {
            if nx == ax && ny == ay {
                continue;
            }
            let neighbor = acc[(ny * acc_w + nx) as usize];
            let later = (ny, nx) > (ay, ax);
            if neighbor > center || (neighbor == center && later) {
                return false;
            }
        }
    }
    true
}

/// Mode of the distances from (cx, cy) to the edge pixels, restricted to the
/// radius range. None when no edge pixel supports any radius in range.
fn estimate_radius(
    edge_points: &[(u32, u32)],
    cx: u32,
    cy: u32,
    min_r: u32,
    max_r: u32,
) -> Option<u32> {
    let mut histogram = vec![0u32; (max_r - min_r + 1) as usize];
    for &(x, y) in edge_points {
        let d = point_distance(x, y, cx, cy).round() as u32;
        if d >= min_r && d <= max_r {
            histogram[(d - min_r) as usize] += 1;
        }
    }

    let (best_bin, &best_count) = histogram
        .iter()
        .enumerate()
        .max_by_key(|&(_, &count)| count)?;
    if best_count == 0 {
        return None;
    }
    Some(min_r + best_bin as u32)
}

fn point_distance(x1: u32, y1: u32, x2: u32, y2: u32) -> f64 {
    let dx = x1 as f64 - x2 as f64;
    let dy = y1 as f64 - y2 as f64;
    (dx * dx + dy * dy).sqrt()
}
