//! In-memory simulated backend for development and tests.
//!
//! Mirrors the real backend's handle semantics without touching any
//! OS device — useful off-hardware and in the test suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tracing::debug;

use crate::backend::{HalBackend, LineHandle, PwmHandle};
use crate::error::DeviceError;

#[derive(Default)]
struct PwmState {
    period_ns: u64,
    duty_ns: u64,
    enabled: bool,
}

/// Simulated GPIO + PWM backend: lines and channels live in process
/// memory, readable back by tests that need to assert on what the
/// controllers commanded.
pub struct SimulatedBackend {
    lines: Mutex<HashMap<u32, u8>>,
    pwms: Mutex<HashMap<u32, PwmState>>,
    next_pwm: AtomicU32,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(HashMap::new()),
            pwms: Mutex::new(HashMap::new()),
            next_pwm: AtomicU32::new(0),
        }
    }

    /// Force a line's simulated input value (for button-press tests).
    pub fn force_line_value(&self, line: LineHandle, value: u8) {
        self.lines.lock().unwrap().insert(line.0, value);
    }

    /// Read back the simulated duty cycle of a PWM channel (for servo
    /// angle assertions in tests).
    pub fn pwm_duty_ns(&self, pwm: PwmHandle) -> Option<u64> {
        self.pwms.lock().unwrap().get(&pwm.0).map(|s| s.duty_ns)
    }

    pub fn pwm_enabled(&self, pwm: PwmHandle) -> Option<bool> {
        self.pwms.lock().unwrap().get(&pwm.0).map(|s| s.enabled)
    }
}

impl HalBackend for SimulatedBackend {
    fn get_output(&self, offset: u32, consumer: &str) -> Result<LineHandle, DeviceError> {
        debug!(offset, consumer, "simulated output line requested");
        self.lines.lock().unwrap().insert(offset, 0);
        Ok(LineHandle(offset))
    }

    fn get_input(&self, offset: u32, consumer: &str) -> Result<LineHandle, DeviceError> {
        debug!(offset, consumer, "simulated input line requested");
        self.lines.lock().unwrap().entry(offset).or_insert(1);
        Ok(LineHandle(offset))
    }

    fn set(&self, line: LineHandle, value: u8) -> Result<(), DeviceError> {
        self.lines.lock().unwrap().insert(line.0, value);
        Ok(())
    }

    fn read(&self, line: LineHandle) -> Result<u8, DeviceError> {
        self.lines
            .lock()
            .unwrap()
            .get(&line.0)
            .copied()
            .ok_or(DeviceError::UnknownHandle)
    }

    fn release(&self, line: LineHandle) -> Result<(), DeviceError> {
        self.lines.lock().unwrap().remove(&line.0);
        Ok(())
    }

    fn pwm_export(&self, _chip: u32, _channel: u32) -> Result<PwmHandle, DeviceError> {
        let id = self.next_pwm.fetch_add(1, Ordering::Relaxed);
        self.pwms.lock().unwrap().insert(id, PwmState::default());
        Ok(PwmHandle(id))
    }

    fn pwm_set_period_ns(&self, pwm: PwmHandle, ns: u64) -> Result<(), DeviceError> {
        let mut pwms = self.pwms.lock().unwrap();
        let s = pwms.get_mut(&pwm.0).ok_or(DeviceError::UnknownHandle)?;
        s.period_ns = ns;
        Ok(())
    }

    fn pwm_set_duty_ns(&self, pwm: PwmHandle, ns: u64) -> Result<(), DeviceError> {
        let mut pwms = self.pwms.lock().unwrap();
        let s = pwms.get_mut(&pwm.0).ok_or(DeviceError::UnknownHandle)?;
        s.duty_ns = ns;
        Ok(())
    }

    fn pwm_enable(&self, pwm: PwmHandle, on: bool) -> Result<(), DeviceError> {
        let mut pwms = self.pwms.lock().unwrap();
        let s = pwms.get_mut(&pwm.0).ok_or(DeviceError::UnknownHandle)?;
        s.enabled = on;
        Ok(())
    }

    fn pwm_unexport(&self, pwm: PwmHandle) -> Result<(), DeviceError> {
        self.pwms.lock().unwrap().remove(&pwm.0);
        Ok(())
    }
}
