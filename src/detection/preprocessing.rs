use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::filter::{gaussian_blur_f32, median_filter};

use crate::params::{BlurConfig, BlurKind, UnsharpConfig};

/// Returns (width, height) such that the image fits the `bound` x `bound`
/// box on its larger side while keeping its aspect ratio.
pub fn resized_dims(width: u32, height: u32, bound: u32) -> (u32, u32) {
    let ratio = width as f64 / height as f64;
    if ratio > 1.0 {
        (bound, (bound as f64 / ratio).round() as u32)
    } else {
        ((ratio * bound as f64).round() as u32, bound)
    }
}

/// Full preprocessing pipeline: resize to the size bound, optionally apply an
/// unsharp mask, then apply the final blur.
pub fn preprocess(
    image: &GrayImage,
    size_bound: u32,
    unsharp: Option<&UnsharpConfig>,
    blur: &BlurConfig,
) -> GrayImage {
    let (w, h) = resized_dims(image.width(), image.height(), size_bound);
    let mut processed = imageops::resize(image, w, h, FilterType::Triangle);

    if let Some(cfg) = unsharp {
        let blurred = apply_blur(&processed, &cfg.blur);
        processed = add_weighted(
            &processed,
            1.0 + cfg.add_weight,
            &blurred,
            cfg.add_weight - 1.0,
            cfg.gamma as f64,
        );
    }

    apply_blur(&processed, blur)
}

pub fn apply_blur(image: &GrayImage, cfg: &BlurConfig) -> GrayImage {
    match cfg.kind {
        BlurKind::Gaussian => gaussian_blur_f32(image, effective_sigma(cfg)),
        BlurKind::Median => {
            let radius = cfg.ksize / 2;
            median_filter(image, radius, radius)
        }
    }
}

/// A sigma of 0 means "derive it from the kernel size", using the standard
/// `0.3*((ksize-1)*0.5 - 1) + 0.8` rule.
fn effective_sigma(cfg: &BlurConfig) -> f32 {
    if cfg.sigma > 0 {
        cfg.sigma as f32
    } else {
        0.3 * ((cfg.ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }
}

/// Saturating per-pixel `alpha*a + beta*b + gamma`.
fn add_weighted(a: &GrayImage, alpha: f64, b: &GrayImage, beta: f64, gamma: f64) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let value =
            alpha * a.get_pixel(x, y)[0] as f64 + beta * b.get_pixel(x, y)[0] as f64 + gamma;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{BlurConfig, BlurKind, UnsharpConfig};

    #[test]
    fn landscape_images_bind_on_width() {
        assert_eq!(resized_dims(4000, 3000, 1200), (1200, 900));
    }

    #[test]
    fn portrait_images_bind_on_height() {
        assert_eq!(resized_dims(3000, 4000, 1200), (900, 1200));
    }

    #[test]
    fn square_images_keep_both_sides_at_the_bound() {
        assert_eq!(resized_dims(500, 500, 1200), (1200, 1200));
    }

    #[test]
    fn preprocess_resizes_to_the_bound() {
        let image = GrayImage::from_pixel(400, 300, Luma([128]));
        let blur = BlurConfig { kind: BlurKind::Gaussian, ksize: 3, sigma: 0 };
        let out = preprocess(&image, 200, None, &blur);
        assert_eq!(out.dimensions(), (200, 150));
    }

    #[test]
    fn unsharp_on_a_flat_image_is_identity_up_to_gamma() {
        // alpha + beta = 2w, so a flat image maps v -> 2w*v + gamma.
        let image = GrayImage::from_pixel(64, 64, Luma([100]));
        let cfg = UnsharpConfig {
            blur: BlurConfig { kind: BlurKind::Median, ksize: 3, sigma: 0 },
            add_weight: 0.5,
            gamma: 10,
        };
        let blurred = apply_blur(&image, &cfg.blur);
        let out = add_weighted(&image, 1.0 + cfg.add_weight, &blurred, cfg.add_weight - 1.0, 10.0);
        assert_eq!(out.get_pixel(32, 32)[0], 110);
    }

    #[test]
    fn add_weighted_saturates() {
        let bright = GrayImage::from_pixel(8, 8, Luma([250]));
        let out = add_weighted(&bright, 3.0, &bright, 1.0, 0.0);
        assert_eq!(out.get_pixel(4, 4)[0], 255);
        let out = add_weighted(&bright, 1.0, &bright, -2.0, 0.0);
        assert_eq!(out.get_pixel(4, 4)[0], 0);
    }

    #[test]
    fn median_blur_uses_half_kernel_radius() {
        // A single bright pixel in a dark field disappears under a 3x3 median.
        let mut image = GrayImage::from_pixel(9, 9, Luma([0]));
        image.put_pixel(4, 4, Luma([255]));
        let cfg = BlurConfig { kind: BlurKind::Median, ksize: 3, sigma: 0 };
        let out = apply_blur(&image, &cfg);
        assert_eq!(out.get_pixel(4, 4)[0], 0);
    }
}
