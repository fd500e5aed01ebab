use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("run id has {0} fields, expected 16")]
    FieldCount(usize),
    #[error("invalid value `{value}` for {field}")]
    BadField { field: &'static str, value: String },
    #[error("unknown blur kind `{0}`")]
    UnknownBlurKind(String),
}

/// Blur operator selector, serialized as `g`/`m` in run ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlurKind {
    Gaussian,
    Median,
}

impl BlurKind {
    pub fn code(self) -> &'static str {
        match self {
            BlurKind::Gaussian => "g",
            BlurKind::Median => "m",
        }
    }

    pub fn parse(code: &str) -> Result<Self, ParamError> {
        match code {
            "g" => Ok(BlurKind::Gaussian),
            "m" => Ok(BlurKind::Median),
            other => Err(ParamError::UnknownBlurKind(other.to_string())),
        }
    }
}

impl fmt::Display for BlurKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One blur application. `sigma` is only meaningful for gaussian blur; a
/// sigma of 0 means "derive it from the kernel size".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlurConfig {
    pub kind: BlurKind,
    pub ksize: u32,
    pub sigma: u32,
}

/// Unsharp-mask settings: the image is combined with a blurred copy as
/// `(1 + add_weight) * original + (add_weight - 1) * blurred + gamma`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnsharpConfig {
    pub blur: BlurConfig,
    pub add_weight: f64,
    pub gamma: i32,
}

/// Hough-transform knobs, mirroring the classic gradient-variant parameters:
/// `dp` is the inverse accumulator resolution, `min_dist` the minimum
/// distance between detected centers, `param1` the upper Canny threshold and
/// `param2` the accumulator vote threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoughConfig {
    pub dp: u32,
    pub min_dist: u32,
    pub param1: u32,
    pub param2: u32,
}

/// One full configuration of preprocessing + detection knobs.
///
/// Radius bounds are stored as fractions of `size_bound` rather than absolute
/// pixels so that parameter sweeps scale with image size; use
/// [`min_radius_px`](Self::min_radius_px) / [`max_radius_px`](Self::max_radius_px)
/// for the resolved values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Larger image dimension after resizing.
    pub size_bound: u32,
    pub unsharp: Option<UnsharpConfig>,
    /// Final blur applied after the optional unsharp mask.
    pub blur: BlurConfig,
    pub hough: HoughConfig,
    pub min_radius_frac: f64,
    pub max_radius_frac: f64,
}

impl ParameterSet {
    pub fn min_radius_px(&self) -> u32 {
        (self.min_radius_frac * self.size_bound as f64).round() as u32
    }

    pub fn max_radius_px(&self) -> u32 {
        (self.max_radius_frac * self.size_bound as f64).round() as u32
    }

    /// Deterministic run identifier: every knob joined by `_` in a fixed
    /// order. Used as the output artifact name and for idempotent re-runs.
    /// Radius bounds appear resolved to pixels.
    pub fn run_id(&self) -> String {
        // Disabled unsharp serializes as zeroed gaussian fields.
        let (enable, u_kind, u_ksize, u_sigma, u_weight, u_gamma) = match &self.unsharp {
            Some(u) => (1, u.blur.kind, u.blur.ksize, u.blur.sigma, u.add_weight, u.gamma),
            None => (0, BlurKind::Gaussian, 0, 0, 0.0, 0),
        };
        format!(
            "{}_{}_{}_{}_{}_{}_{}_{}_{}_{}_{}_{}_{}_{}_{}_{}",
            self.size_bound,
            enable,
            u_kind,
            u_ksize,
            u_sigma,
            u_weight,
            u_gamma,
            self.blur.kind,
            self.blur.ksize,
            self.blur.sigma,
            self.hough.dp,
            self.hough.min_dist,
            self.hough.param1,
            self.hough.param2,
            self.min_radius_px(),
            self.max_radius_px(),
        )
    }

    /// Parses a run id back into a parameter set. A malformed id is a
    /// configuration error; there is no recovery.
    pub fn parse(id: &str) -> Result<Self, ParamError> {
        let fields: Vec<&str> = id.split('_').collect();
        if fields.len() != 16 {
            return Err(ParamError::FieldCount(fields.len()));
        }

        fn int(field: &'static str, value: &str) -> Result<u32, ParamError> {
            value.parse().map_err(|_| ParamError::BadField {
                field,
                value: value.to_string(),
            })
        }

        let size_bound = int("size_bound", fields[0])?;
        let unsharp = match fields[1] {
            "1" => Some(UnsharpConfig {
                blur: BlurConfig {
                    kind: BlurKind::parse(fields[2])?,
                    ksize: int("unsharp_ksize", fields[3])?,
                    sigma: int("unsharp_sigma", fields[4])?,
                },
                add_weight: fields[5].parse().map_err(|_| ParamError::BadField {
                    field: "unsharp_add_weight",
                    value: fields[5].to_string(),
                })?,
                gamma: fields[6].parse().map_err(|_| ParamError::BadField {
                    field: "unsharp_gamma",
                    value: fields[6].to_string(),
                })?,
            }),
            "0" => None,
            other => {
                return Err(ParamError::BadField {
                    field: "enable_unsharp",
                    value: other.to_string(),
                });
            }
        };

        let min_radius_px = int("min_radius", fields[14])?;
        let max_radius_px = int("max_radius", fields[15])?;

        Ok(Self {
            size_bound,
            unsharp,
            blur: BlurConfig {
                kind: BlurKind::parse(fields[7])?,
                ksize: int("blur_ksize", fields[8])?,
                sigma: int("blur_sigma", fields[9])?,
            },
            hough: HoughConfig {
                dp: int("dp", fields[10])?,
                min_dist: int("min_dist", fields[11])?,
                param1: int("param1", fields[12])?,
                param2: int("param2", fields[13])?,
            },
            min_radius_frac: min_radius_px as f64 / size_bound as f64,
            max_radius_frac: max_radius_px as f64 / size_bound as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> ParameterSet {
        ParameterSet {
            size_bound: 1200,
            unsharp: Some(UnsharpConfig {
                blur: BlurConfig { kind: BlurKind::Gaussian, ksize: 9, sigma: 5 },
                add_weight: 0.4,
                gamma: 0,
            }),
            blur: BlurConfig { kind: BlurKind::Median, ksize: 15, sigma: 0 },
            hough: HoughConfig { dp: 2, min_dist: 1, param1: 30, param2: 15 },
            min_radius_frac: 1.0 / 16.0,
            max_radius_frac: 1.0,
        }
    }

    #[test]
    fn run_id_uses_fixed_field_order() {
        assert_eq!(
            sample_set().run_id(),
            "1200_1_g_9_5_0.4_0_m_15_0_2_1_30_15_75_1200"
        );
    }

    #[test]
    fn run_id_round_trips() {
        let set = sample_set();
        let parsed = ParameterSet::parse(&set.run_id()).unwrap();
        assert_eq!(parsed.run_id(), set.run_id());
        assert_eq!(parsed, set);
    }

    #[test]
    fn disabled_unsharp_serializes_zeroed() {
        let mut set = sample_set();
        set.unsharp = None;
        let id = set.run_id();
        assert!(id.starts_with("1200_0_g_0_0_0_0_"));
        assert_eq!(ParameterSet::parse(&id).unwrap().unsharp, None);
    }

    #[test]
    fn unknown_blur_kind_is_fatal() {
        let id = "1200_0_g_0_0_0_0_x_15_0_2_1_30_15_75_1200";
        assert_eq!(
            ParameterSet::parse(id),
            Err(ParamError::UnknownBlurKind("x".to_string()))
        );
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        assert_eq!(ParameterSet::parse("1_2_3"), Err(ParamError::FieldCount(3)));
    }
}
