//! Convenience re-exports: `use turret_common::prelude::*;`.

pub use crate::config::TurretConfig;
pub use crate::error::{Result, TurretError};
pub use crate::model::{
    Angle, CalibrationTable, Detection, DetectionClass, DetectionLayout, EventKind, EventRecord,
    NormalizedPoint, Rect,
};
