//! Turret Common Library
//!
//! Shared types, configuration loading, error kinds, and constants used
//! across the turret control core crates.
//!
//! # Module Structure
//!
//! - [`model`] - Angle, NormalizedPoint, CalibrationTable, Detection, EventRecord
//! - [`config`] - TOML-loaded root configuration
//! - [`error`] - `TurretError` and its propagation policy
//! - [`consts`] - Tunable constants (thresholds, timers, pulse ranges)
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod error;
pub mod model;
pub mod prelude;
