pub mod hough;
pub mod preprocessing;

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use image::GrayImage;
use log::{info, warn};

use crate::models::{Circle, EclipseRecord};
use crate::params::ParameterSet;

/// Preprocessing + Hough detection under one parameter set.
pub struct CircleDetector {
    params: ParameterSet,
}

impl CircleDetector {
    pub fn new(params: ParameterSet) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Runs the full pipeline on a source-resolution grayscale image and
    /// returns up to two circles, mapped back to source coordinates. The two
    /// circles are in discovery order; no solar/lunar role is implied.
    pub fn detect(&self, image: &GrayImage) -> (Option<Circle>, Option<Circle>) {
        let processed = preprocessing::preprocess(
            image,
            self.params.size_bound,
            self.params.unsharp.as_ref(),
            &self.params.blur,
        );
        let found = hough::hough_circles(
            &processed,
            &self.params.hough,
            self.params.min_radius_px(),
            self.params.max_radius_px(),
        );

        let mut found = found.into_iter();
        let first = found.next();
        let second = found.next();
        (
            first.map(|c| rescale(&c, image.height(), processed.height())),
            second.map(|c| rescale(&c, image.height(), processed.height())),
        )
    }
}

/// Maps a circle detected on the resized image back to source resolution by
/// the height ratio, rounding every coordinate. Inverse of the preprocessing
/// resize, up to rounding.
pub fn rescale(circle: &Circle, original_height: u32, resized_height: u32) -> Circle {
    circle.scaled(original_height as f64 / resized_height as f64)
}

/// Runs one configuration over every image named in `image_list` (one name
/// per line, relative to `image_dir`) and writes one record line per image to
/// `output_run-<run id>` in `out_dir`. Unreadable images are logged and
/// skipped. Returns the output path.
pub fn run_detection(
    params: &ParameterSet,
    image_list: &Path,
    image_dir: &Path,
    out_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let started = Instant::now();

    let listing = fs::read_to_string(image_list)
        .with_context(|| format!("reading image list {}", image_list.display()))?;
    let names: Vec<&str> = listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    anyhow::ensure!(!names.is_empty(), "no images listed in {}", image_list.display());

    let out_path = out_dir.join(format!("output_run-{}", params.run_id()));
    let mut out = File::create(&out_path)
        .with_context(|| format!("creating {}", out_path.display()))?;

    let detector = CircleDetector::new(params.clone());
    for name in names {
        let path = image_dir.join(name);
        let image = match image::open(&path) {
            Ok(image) => image.to_luma8(),
            Err(err) => {
                warn!("{} could not be read: {err}", path.display());
                continue;
            }
        };

        let (first, second) = detector.detect(&image);
        // NC for "not classified": detector output carries no image type.
        let record = EclipseRecord {
            name: name.to_string(),
            image_type: "NC".to_string(),
            solar: first,
            lunar: second,
        };
        writeln!(out, "{}", record.to_line())?;
    }

    info!(
        "run {} finished in {:.2}s",
        params.run_id(),
        started.elapsed().as_secs_f64()
    );
    Ok(out_path)
}
