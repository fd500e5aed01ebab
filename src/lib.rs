pub mod annotation;
pub mod detection;
pub mod geometry;
pub mod labeling;
pub mod models;
pub mod params;
pub mod scoring;
pub mod sweep;

pub use annotation::{AnnotationEvent, AnnotationSession};
pub use detection::CircleDetector;
pub use geometry::{GeometryError, fit_circle};
pub use labeling::{BatchLabeler, LabelService, LabeledImage, RetryPolicy};
pub use models::{Circle, EclipseRecord, Point, Role};
pub use params::{BlurConfig, BlurKind, HoughConfig, ParameterSet, UnsharpConfig};
pub use scoring::{LossReport, LossSample};
pub use sweep::SweepGrid;
