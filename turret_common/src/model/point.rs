//! Normalized detector-frame coordinates.

use crate::error::TurretError;

/// A point `(u, v)` in the detector's normalized view, `u, v ∈ [0, 1]`.
///
/// `(0, 0)` is the top-left corner of the detector's view. Unlike
/// [`crate::model::Angle`], out-of-range values are a caller mistake
/// and are rejected rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub u: f64,
    pub v: f64,
}

impl NormalizedPoint {
    /// Construct a point, rejecting coordinates outside `[0, 1]`.
    pub fn new(u: f64, v: f64) -> Result<Self, TurretError> {
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return Err(TurretError::BadRequest(format!(
                "point ({u}, {v}) outside [0, 1]^2"
            )));
        }
        Ok(Self { u, v })
    }
}
