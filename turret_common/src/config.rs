//! Root TOML configuration, loaded once at startup.
//!
//! Unlike the calibration JSON document (§3 of the design: "if missing
//! or malformed, a default is written"), a missing `TurretConfig` file
//! is fatal — there is no sane default for which GPIO chip or PWM
//! channel to open.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::TurretError;

/// Digital line configuration on the GPIO chip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    #[serde(default = "default_gpio_chip")]
    pub chip: String,
    #[serde(default = "default_laser_offset")]
    pub laser_offset: u32,
    #[serde(default = "default_button_offset")]
    pub button_offset: u32,
}

fn default_gpio_chip() -> String {
    "gpiochip0".to_string()
}
fn default_laser_offset() -> u32 {
    17
}
fn default_button_offset() -> u32 {
    27
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            chip: default_gpio_chip(),
            laser_offset: default_laser_offset(),
            button_offset: default_button_offset(),
        }
    }
}

/// One PWM channel's chip/channel addressing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PwmConfig {
    pub chip: u32,
    pub channel: u32,
}

/// Both servo PWM channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServosConfig {
    #[serde(default = "default_x_pwm")]
    pub x: PwmConfig,
    #[serde(default = "default_y_pwm")]
    pub y: PwmConfig,
}

fn default_x_pwm() -> PwmConfig {
    PwmConfig {
        chip: 0,
        channel: 0,
    }
}
fn default_y_pwm() -> PwmConfig {
    PwmConfig {
        chip: 0,
        channel: 1,
    }
}

impl Default for ServosConfig {
    fn default() -> Self {
        Self {
            x: default_x_pwm(),
            y: default_y_pwm(),
        }
    }
}

/// Root configuration for the turret binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurretConfig {
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default)]
    pub servos: ServosConfig,
    #[serde(default = "default_calibration_path")]
    pub calibration_path: PathBuf,
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
    #[serde(default = "default_http_bind")]
    pub http_bind: String,
    #[serde(default = "default_protected_count")]
    pub protected_class_count: u32,
    #[serde(default = "default_target_count")]
    pub target_class_count: u32,
}

fn default_calibration_path() -> PathBuf {
    PathBuf::from("/etc/turret/calibration.json")
}
fn default_journal_path() -> PathBuf {
    PathBuf::from("/var/lib/turret/db.sqlite3")
}
fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_protected_count() -> u32 {
    1
}
fn default_target_count() -> u32 {
    1
}

impl Default for TurretConfig {
    fn default() -> Self {
        Self {
            gpio: GpioConfig::default(),
            servos: ServosConfig::default(),
            calibration_path: default_calibration_path(),
            journal_path: default_journal_path(),
            http_bind: default_http_bind(),
            protected_class_count: default_protected_count(),
            target_class_count: default_target_count(),
        }
    }
}

impl TurretConfig {
    /// Load from a TOML file. A missing or malformed file is an error
    /// — the caller should treat this as fatal to startup.
    pub fn load(path: &Path) -> Result<Self, TurretError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TurretError::NotInitialized(format!("config file {}: {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| {
            TurretError::BadRequest(format!("invalid config at {}: {e}", path.display()))
        })
    }
}
