//! Pluggable device backend trait.
//!
//! Mirrors the spec's own vocabulary (`open_chip`, `get_output`,
//! `get_input`, `set`, `read`, `release`, `wait_for_value`) plus a
//! parallel PWM surface (`export`, `set_period_ns`, `set_duty_ns`,
//! `enable`, `unexport`). Two backends implement it: [`crate::linux::LinuxGpioPwmBackend`]
//! against real hardware, and [`crate::simulated::SimulatedBackend`] for
//! development and tests.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::error::DeviceError;

/// Opaque handle to a requested GPIO line. Exclusively owned by
/// whichever controller requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineHandle(pub u32);

/// Opaque handle to an exported PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PwmHandle(pub u32);

/// Digital output/input lines plus hardware PWM channels, abstracted
/// over a real Linux backend or an in-memory simulation.
pub trait HalBackend: Send + Sync {
    /// Request a line as a digital output, driven low initially.
    fn get_output(&self, offset: u32, consumer: &str) -> Result<LineHandle, DeviceError>;

    /// Request a line as a digital input.
    fn get_input(&self, offset: u32, consumer: &str) -> Result<LineHandle, DeviceError>;

    /// Drive an output line high (`1`) or low (`0`).
    fn set(&self, line: LineHandle, value: u8) -> Result<(), DeviceError>;

    /// Read the current value of a line.
    fn read(&self, line: LineHandle) -> Result<u8, DeviceError>;

    /// Release a previously requested line.
    fn release(&self, line: LineHandle) -> Result<(), DeviceError>;

    /// Poll `line` at ≤10 ms granularity until it reads `target`, or
    /// `cancel` is observed set.
    fn wait_for_value(
        &self,
        line: LineHandle,
        target: u8,
        cancel: &AtomicBool,
    ) -> Result<(), DeviceError> {
        use std::sync::atomic::Ordering;
        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(DeviceError::Cancelled);
            }
            if self.read(line)? == target {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Export a PWM channel on `chip`/`channel`.
    fn pwm_export(&self, chip: u32, channel: u32) -> Result<PwmHandle, DeviceError>;

    /// Set the PWM period, in nanoseconds.
    fn pwm_set_period_ns(&self, pwm: PwmHandle, ns: u64) -> Result<(), DeviceError>;

    /// Set the PWM duty cycle, in nanoseconds.
    fn pwm_set_duty_ns(&self, pwm: PwmHandle, ns: u64) -> Result<(), DeviceError>;

    /// Enable or disable PWM output.
    fn pwm_enable(&self, pwm: PwmHandle, on: bool) -> Result<(), DeviceError>;

    /// Unexport a PWM channel, releasing it.
    fn pwm_unexport(&self, pwm: PwmHandle) -> Result<(), DeviceError>;
}
