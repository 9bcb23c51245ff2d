//! Calibration table: piecewise-linear angle ranges per axis.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::TurretError;

/// Default calibration written on first run, per the source layout
/// `{[23,55],[10,65],[36,38]}` (`xRange`, `yRange`, `center`).
const DEFAULT_X_RANGE: (f64, f64) = (23.0, 55.0);
const DEFAULT_Y_RANGE: (f64, f64) = (10.0, 65.0);
const DEFAULT_CENTER: (f64, f64) = (36.0, 38.0);

/// Three pairs of angles describing the servo's piecewise-linear
/// response to normalized input: `xRange = (xLeft, xRight)`,
/// `yRange = (yBottom, yTop)`, `center = (xCenter, yCenter)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationTable {
    #[serde(rename = "calibrationX")]
    pub x_range: (f64, f64),
    #[serde(rename = "calibrationY")]
    pub y_range: (f64, f64),
    #[serde(rename = "calibrationCenter")]
    pub center: (f64, f64),
}

impl CalibrationTable {
    /// `xLeft, xRight, yBottom, yTop`.
    #[inline]
    pub fn x_left(&self) -> f64 {
        self.x_range.0
    }
    #[inline]
    pub fn x_right(&self) -> f64 {
        self.x_range.1
    }
    #[inline]
    pub fn y_bottom(&self) -> f64 {
        self.y_range.0
    }
    #[inline]
    pub fn y_top(&self) -> f64 {
        self.y_range.1
    }
    #[inline]
    pub fn x_center(&self) -> f64 {
        self.center.0
    }
    #[inline]
    pub fn y_center(&self) -> f64 {
        self.center.1
    }

    /// Validate the three invariants: `xLeft ≠ xRight`, `yBottom ≠
    /// yTop`, and each center lies between its range's endpoints.
    pub fn validate(&self) -> Result<(), TurretError> {
        if self.x_range.0 == self.x_range.1 {
            return Err(TurretError::BadRequest("xLeft == xRight".into()));
        }
        if self.y_range.0 == self.y_range.1 {
            return Err(TurretError::BadRequest("yBottom == yTop".into()));
        }
        if !between(self.center.0, self.x_range.0, self.x_range.1) {
            return Err(TurretError::BadRequest(
                "xCenter not between xLeft and xRight".into(),
            ));
        }
        if !between(self.center.1, self.y_range.0, self.y_range.1) {
            return Err(TurretError::BadRequest(
                "yCenter not between yBottom and yTop".into(),
            ));
        }
        Ok(())
    }

    fn default_table() -> Self {
        Self {
            x_range: DEFAULT_X_RANGE,
            y_range: DEFAULT_Y_RANGE,
            center: DEFAULT_CENTER,
        }
    }

    /// Load from a JSON file at `path`; if missing or malformed, write
    /// and return the default table instead of failing.
    pub fn load_or_default(path: &Path) -> Result<Self, TurretError> {
        let parsed = std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str::<Self>(&raw).ok())
            .filter(|t| t.validate().is_ok());

        let table = match parsed {
            Some(t) => {
                info!(path = %path.display(), "loaded calibration table");
                return Ok(t);
            }
            None => {
                warn!(path = %path.display(), "calibration file missing or malformed, writing default");
                Self::default_table()
            }
        };
        table.write(path)?;
        Ok(table)
    }

    /// Persist this table as JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<(), TurretError> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| TurretError::Persistence(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TurretError::Persistence(e.to_string()))?;
        }
        std::fs::write(path, raw).map_err(|e| TurretError::Persistence(e.to_string()))
    }
}

fn between(v: f64, a: f64, b: f64) -> bool {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    v >= lo && v <= hi
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_table_is_valid() {
        assert!(CalibrationTable::default_table().validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_range() {
        let t = CalibrationTable {
            x_range: (30.0, 30.0),
            y_range: (10.0, 65.0),
            center: (30.0, 38.0),
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn rejects_center_outside_range() {
        let t = CalibrationTable {
            x_range: (23.0, 55.0),
            y_range: (10.0, 65.0),
            center: (100.0, 38.0),
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn missing_file_writes_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        assert!(!path.exists());

        let table = CalibrationTable::load_or_default(&path).unwrap();
        assert_eq!(table.center, DEFAULT_CENTER);
        assert!(path.exists());

        let reloaded = CalibrationTable::load_or_default(&path).unwrap();
        assert_eq!(reloaded.center, table.center);
    }

    #[test]
    fn malformed_file_is_replaced_with_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        std::fs::write(&path, "{ not json").unwrap();

        let table = CalibrationTable::load_or_default(&path).unwrap();
        assert_eq!(table.center, DEFAULT_CENTER);
    }
}
