//! Servo Controller: owns one hardware PWM channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{info, warn};
use turret_common::consts::{SERVO_FREQUENCY_HZ, SERVO_PULSE_MAX_US, SERVO_PULSE_MIN_US};
use turret_common::error::TurretError;
use turret_common::model::Angle;
use turret_hal::{HalBackend, PwmHandle};

/// Owns one PWM channel. Maps angle `[0, 180]°` linearly onto the
/// configured pulse-width range and honours the emergency lock.
pub struct ServoController {
    hal: std::sync::Arc<dyn HalBackend>,
    pwm: PwmHandle,
    locked: AtomicBool,
    last_commanded: Mutex<Angle>,
    name: &'static str,
}

fn pulse_us(angle: Angle) -> f64 {
    let span = (SERVO_PULSE_MAX_US - SERVO_PULSE_MIN_US) as f64;
    SERVO_PULSE_MIN_US as f64 + span * (angle.degrees() / Angle::MAX)
}

impl ServoController {
    /// Request and configure the PWM channel, then enable output.
    pub fn new(
        hal: std::sync::Arc<dyn HalBackend>,
        chip: u32,
        channel: u32,
        name: &'static str,
    ) -> Result<Self, TurretError> {
        let pwm = hal
            .pwm_export(chip, channel)
            .map_err(|e| TurretError::Device(e.to_string()))?;
        let period_ns = 1_000_000_000u64 / SERVO_FREQUENCY_HZ as u64;
        hal.pwm_set_period_ns(pwm, period_ns)
            .map_err(|e| TurretError::Device(e.to_string()))?;
        hal.pwm_enable(pwm, true)
            .map_err(|e| TurretError::Device(e.to_string()))?;
        let this = Self {
            hal,
            pwm,
            locked: AtomicBool::new(false),
            last_commanded: Mutex::new(Angle::default()),
            name,
        };
        this.set_angle(Angle::default());
        Ok(this)
    }

    /// Clamp `a` into `[0, 180]`; if locked, ignore silently; else
    /// command the corresponding duty cycle.
    pub fn set_angle(&self, angle: Angle) {
        if self.locked.load(Ordering::Acquire) {
            return;
        }
        let duty_ns = pulse_us(angle).round() as u64 * 1000;
        if let Err(e) = self.hal.pwm_set_duty_ns(self.pwm, duty_ns) {
            warn!(servo = self.name, error = %e, "failed to command servo duty cycle");
        }
        *self.last_commanded.lock().unwrap() = angle;
    }

    pub fn angle(&self) -> Angle {
        *self.last_commanded.lock().unwrap()
    }

    /// Command the minimum pulse (angle 0) and set the emergency lock.
    pub fn emergency_disable_and_lock(&self) {
        self.locked.store(false, Ordering::Release); // allow the forced angle 0 write through set_angle
        self.set_angle(Angle::clamped(0.0));
        self.locked.store(true, Ordering::Release);
        info!(servo = self.name, "servo emergency-locked at 0 degrees");
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
        info!(servo = self.name, "servo unlocked");
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn teardown(&self) {
        if let Err(e) = self.hal.pwm_enable(self.pwm, false) {
            warn!(servo = self.name, error = %e, "failed to disable PWM during teardown");
        }
        if let Err(e) = self.hal.pwm_unexport(self.pwm) {
            warn!(servo = self.name, error = %e, "failed to unexport PWM during teardown");
        }
    }
}
