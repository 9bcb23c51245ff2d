//! Data model shared by the HAL, control, journal, and API crates.

mod angle;
mod calibration;
mod detection;
mod event;
mod point;

pub use angle::Angle;
pub use calibration::CalibrationTable;
pub use detection::{Detection, DetectionClass, DetectionLayout, Rect};
pub use event::{EventKind, EventRecord};
pub use point::NormalizedPoint;
