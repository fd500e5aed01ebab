use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Real-valued pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Circle described by center and radius in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub r: f64,
}

impl Circle {
    pub fn new(cx: f64, cy: f64, r: f64) -> Self {
        Self { cx, cy, r }
    }

    /// Multiplies every coordinate by `ratio`, rounding each to the nearest
    /// integer. Used to map circles between resized and full-resolution space.
    pub fn scaled(&self, ratio: f64) -> Circle {
        Circle {
            cx: (self.cx * ratio).round(),
            cy: (self.cy * ratio).round(),
            r: (self.r * ratio).round(),
        }
    }
}

/// Which of the two expected disks a circle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Solar,
    Lunar,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed record line: {0}")]
    MalformedLine(String),
    #[error("malformed circle field: {0}")]
    BadCircle(String),
}

/// One image's worth of circle data, as stored in the pipe-delimited record
/// files shared by annotation output, detection output and the scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct EclipseRecord {
    pub name: String,
    pub image_type: String,
    pub solar: Option<Circle>,
    pub lunar: Option<Circle>,
}

impl EclipseRecord {
    /// Serializes to `name|type|solar|lunar`, circles as `None` or
    /// `(cx, cy, r)` with integer fields.
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.name,
            self.image_type,
            format_circle(self.solar.as_ref()),
            format_circle(self.lunar.as_ref()),
        )
    }

    pub fn parse_line(line: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = line.trim().split('|').collect();
        if fields.len() != 4 {
            return Err(RecordError::MalformedLine(line.to_string()));
        }
        Ok(Self {
            name: fields[0].to_string(),
            image_type: fields[1].to_string(),
            solar: parse_circle(fields[2])?,
            lunar: parse_circle(fields[3])?,
        })
    }
}

/// Formats an optional circle the way record files expect it.
pub fn format_circle(circle: Option<&Circle>) -> String {
    match circle {
        None => "None".to_string(),
        Some(c) => format!(
            "({}, {}, {})",
            c.cx.round() as i64,
            c.cy.round() as i64,
            c.r.round() as i64
        ),
    }
}

pub fn parse_circle(field: &str) -> Result<Option<Circle>, RecordError> {
    let field = field.trim();
    if field == "None" {
        return Ok(None);
    }
    let inner = field
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| RecordError::BadCircle(field.to_string()))?;
    let values: Vec<f64> = inner
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| RecordError::BadCircle(field.to_string()))?;
    if values.len() != 3 {
        return Err(RecordError::BadCircle(field.to_string()));
    }
    Ok(Some(Circle::new(values[0], values[1], values[2])))
}

/// Parses a whole record file into a map keyed by image name.
pub fn parse_records(contents: &str) -> Result<HashMap<String, EclipseRecord>, RecordError> {
    let mut records = HashMap::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record = EclipseRecord::parse_line(line)?;
        records.insert(record.name.clone(), record);
    }
    Ok(records)
}

/// Appends one record line to an append-only output file, creating it if
/// needed. This is how each completed annotation is persisted.
pub fn append_record(path: &Path, record: &EclipseRecord) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", record.to_line())
}
