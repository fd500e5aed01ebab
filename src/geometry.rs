use thiserror::Error;

use crate::models::{Circle, Point};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// The three points are collinear, coincident, or share a coordinate in a
    /// way that leaves no usable chord. Callers should prompt for new points.
    #[error("the three points do not define a unique circle")]
    DegenerateInput,
}

/// Computes the circle passing through three points.
///
/// Three unique points A, B, C on a circle define a triangle ABC, and the
/// perpendicular bisectors of the chords AB and BC intersect at the circle's
/// center. B must not share an x or y coordinate with A or C, otherwise a
/// chord is exactly vertical or horizontal and the slope math divides by
/// zero; the three possible rotations of the input are tried to find a valid
/// B before giving up.
pub fn fit_circle(points: &[Point; 3]) -> Result<Circle, GeometryError> {
    let a_idx = if valid_b_point(points[1], points[0], points[2]) {
        0
    } else if valid_b_point(points[2], points[1], points[0]) {
        1
    } else if valid_b_point(points[0], points[2], points[1]) {
        2
    } else {
        return Err(GeometryError::DegenerateInput);
    };

    let a = points[a_idx % 3];
    let b = points[(a_idx + 1) % 3];
    let c = points[(a_idx + 2) % 3];

    let (m_ab, b_ab) = perpendicular_bisector(a, b);
    let (m_bc, b_bc) = perpendicular_bisector(b, c);

    // Parallel bisectors mean the points are collinear.
    if (m_bc - m_ab).abs() < f64::EPSILON {
        return Err(GeometryError::DegenerateInput);
    }

    let cx = (b_ab - b_bc) / (m_bc - m_ab);
    let cy = m_ab * cx + b_ab;
    let r = ((cx - a.x).powi(2) + (cy - a.y).powi(2)).sqrt();

    Ok(Circle::new(cx, cy, r))
}

/// Slope and y-intercept of the perpendicular bisector of chord PQ.
fn perpendicular_bisector(p: Point, q: Point) -> (f64, f64) {
    let dx = p.x - q.x;
    let dy = p.y - q.y;
    let mid_x = p.x - dx / 2.0;
    let mid_y = p.y - dy / 2.0;
    // Negative reciprocal of the chord slope dy/dx.
    let m = -dx / dy;
    (m, mid_y - m * mid_x)
}

fn valid_b_point(b: Point, a: Point, c: Point) -> bool {
    b.x != a.x && b.y != a.y && b.x != c.x && b.y != c.y
}
