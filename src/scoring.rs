use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::warn;
use thiserror::Error;

use crate::models::{Circle, EclipseRecord, RecordError, parse_records};

/// Cost charged when exactly one side has a circle: a completely missed or
/// spuriously invented circle counts as a large but finite, comparable loss.
pub const MISSING_CIRCLE_COST: f64 = 1000.0;

#[derive(Debug, Error)]
pub enum ScoreError {
    /// The two datasets share no image keys; no report can be produced.
    #[error("no overlapping samples between the two datasets")]
    NoSamples,
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Loss between one expected and one detected circle of the same role.
///
/// Both absent is a perfect 0; one absent is [`MISSING_CIRCLE_COST`];
/// otherwise `distance² + (2·|Δradius|)²`, which keeps center error and size
/// error comparably scaled while penalizing large misses superlinearly.
pub fn score_pair(expected: Option<&Circle>, actual: Option<&Circle>) -> f64 {
    match (expected, actual) {
        (None, None) => 0.0,
        (Some(_), None) | (None, Some(_)) => MISSING_CIRCLE_COST,
        (Some(e), Some(a)) => {
            let distance = ((e.cx - a.cx).powi(2) + (e.cy - a.cy).powi(2)).sqrt();
            let size_diff = 2.0 * (e.r - a.r).abs();
            distance.powi(2) + size_diff.powi(2)
        }
    }
}

/// Sums the solar-role and lunar-role losses for one image. Roles are
/// pre-labeled on both sides; this is not a general assignment problem.
pub fn score_image(expected: &EclipseRecord, actual: &EclipseRecord) -> (f64, f64) {
    (
        score_pair(expected.solar.as_ref(), actual.solar.as_ref()),
        score_pair(expected.lunar.as_ref(), actual.lunar.as_ref()),
    )
}

/// Like [`score_image`], but tries both assignments of the detected pair to
/// the solar/lunar roles and keeps the cheaper one. The detector reports
/// circles in discovery order with no guaranteed role, so positional scoring
/// can punish a correct detection; this makes role assignment explicit.
pub fn score_image_best_assignment(
    expected: &EclipseRecord,
    actual: &EclipseRecord,
) -> (f64, f64) {
    let straight = score_image(expected, actual);
    let swapped = (
        score_pair(expected.solar.as_ref(), actual.lunar.as_ref()),
        score_pair(expected.lunar.as_ref(), actual.solar.as_ref()),
    );
    if swapped.0 + swapped.1 < straight.0 + straight.1 {
        swapped
    } else {
        straight
    }
}

/// Per-image loss with identifying context.
#[derive(Debug, Clone, PartialEq)]
pub struct LossSample {
    pub key: String,
    pub image_type: String,
    pub solar_loss: f64,
    pub lunar_loss: f64,
}

impl LossSample {
    pub fn total(&self) -> f64 {
        self.solar_loss + self.lunar_loss
    }
}

/// Accumulated loss for one image type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeBucket {
    pub total: f64,
    pub samples: usize,
}

impl TypeBucket {
    /// `None` when the bucket is empty: the average is undefined, not 0.
    pub fn average(&self) -> Option<f64> {
        if self.samples == 0 {
            None
        } else {
            Some(self.total / self.samples as f64)
        }
    }
}

/// Aggregate loss over every scored image.
#[derive(Debug, Clone, PartialEq)]
pub struct LossReport {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub total: f64,
    pub samples: usize,
    by_type: HashMap<String, TypeBucket>,
}

impl LossReport {
    /// `None` for a type with no samples.
    pub fn average_for_type(&self, image_type: &str) -> Option<f64> {
        self.by_type.get(image_type).and_then(TypeBucket::average)
    }

    pub fn by_type(&self) -> &HashMap<String, TypeBucket> {
        &self.by_type
    }
}

/// Scores every key shared by both datasets, in sorted key order. Keys
/// present on only one side are logged and skipped rather than failing the
/// whole run. The image type attributed to each sample comes from the
/// expected (ground-truth) side.
pub fn score_datasets(
    expected: &HashMap<String, EclipseRecord>,
    actual: &HashMap<String, EclipseRecord>,
    best_assignment: bool,
) -> Vec<LossSample> {
    let mut keys: Vec<&String> = expected.keys().collect();
    keys.sort();

    let mut samples = Vec::new();
    for key in keys {
        let exp = &expected[key];
        let Some(act) = actual.get(key) else {
            warn!("key not found in detected data: {key}");
            continue;
        };
        let (solar_loss, lunar_loss) = if best_assignment {
            score_image_best_assignment(exp, act)
        } else {
            score_image(exp, act)
        };
        samples.push(LossSample {
            key: key.clone(),
            image_type: exp.image_type.clone(),
            solar_loss,
            lunar_loss,
        });
    }

    for key in actual.keys() {
        if !expected.contains_key(key) {
            warn!("key not found in ground truth: {key}");
        }
    }

    samples
}

/// Global min/max/avg/total plus a per-type average breakdown. An empty
/// sample set is a precondition violation: there is nothing to report.
pub fn aggregate(samples: &[LossSample]) -> Result<LossReport, ScoreError> {
    if samples.is_empty() {
        return Err(ScoreError::NoSamples);
    }

    let mut min = f64::INFINITY;
    let mut max = 0.0f64;
    let mut total = 0.0;
    let mut by_type: HashMap<String, TypeBucket> = HashMap::new();

    for sample in samples {
        let loss = sample.total();
        min = min.min(loss);
        max = max.max(loss);
        total += loss;

        let bucket = by_type.entry(sample.image_type.clone()).or_default();
        bucket.total += loss;
        bucket.samples += 1;
    }

    Ok(LossReport {
        min,
        max,
        avg: total / samples.len() as f64,
        total,
        samples: samples.len(),
        by_type,
    })
}

/// Reads a pipe-delimited record file into a map keyed by image name.
pub fn read_record_file(path: &Path) -> Result<HashMap<String, EclipseRecord>, ScoreError> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_records(&contents)?)
}
