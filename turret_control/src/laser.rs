//! Laser Controller: owns the laser output line, honours the lock.

use std::sync::Mutex;

use tracing::{info, warn};
use turret_common::error::TurretError;
use turret_hal::{HalBackend, LineHandle};

/// Laser on/off/uninitialized status, as reported by `status()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserStatus {
    Uninitialized,
    Enabled,
    Disabled,
}

struct Inner {
    status: LaserStatus,
    locked_for_emergency: bool,
}

/// Owns one digital output line. Thread-safe: every operation
/// serializes under the controller's own mutex.
pub struct LaserController {
    hal: std::sync::Arc<dyn HalBackend>,
    line: LineHandle,
    state: Mutex<Inner>,
}

impl LaserController {
    pub fn new(hal: std::sync::Arc<dyn HalBackend>, line: LineHandle) -> Self {
        Self {
            hal,
            line,
            state: Mutex::new(Inner {
                status: LaserStatus::Disabled,
                locked_for_emergency: false,
            }),
        }
    }

    /// Drive the line HIGH. Fails `Locked` under emergency lock, or
    /// `BadRequest` if already enabled.
    pub fn enable(&self) -> Result<&'static str, TurretError> {
        let mut s = self.state.lock().unwrap();
        if s.locked_for_emergency {
            return Err(TurretError::Locked("laser locked by emergency".into()));
        }
        if s.status == LaserStatus::Enabled {
            return Err(TurretError::BadRequest("laser already enabled".into()));
        }
        self.hal
            .set(self.line, 1)
            .map_err(|e| TurretError::Device(e.to_string()))?;
        s.status = LaserStatus::Enabled;
        info!("laser enabled");
        Ok("Laser enabled")
    }

    /// Drive the line LOW. Succeeds even when locked (fail-safe
    /// direction). Fails `BadRequest` if already disabled.
    pub fn disable(&self) -> Result<&'static str, TurretError> {
        let mut s = self.state.lock().unwrap();
        if s.status == LaserStatus::Disabled {
            return Err(TurretError::BadRequest("laser already disabled".into()));
        }
        self.hal
            .set(self.line, 0)
            .map_err(|e| TurretError::Device(e.to_string()))?;
        s.status = LaserStatus::Disabled;
        info!("laser disabled");
        Ok("Laser disabled")
    }

    /// Drive LOW, swallowing `BadRequest` from an already-disabled
    /// line, and set the emergency lock.
    pub fn emergency_disable_and_lock(&self) {
        let mut s = self.state.lock().unwrap();
        if let Err(e) = self.hal.set(self.line, 0) {
            warn!(error = %e, "emergency laser disable failed at the device level");
        }
        s.status = LaserStatus::Disabled;
        s.locked_for_emergency = true;
        info!("laser emergency-disabled and locked");
    }

    /// Clear the emergency lock. Does not alter line state.
    pub fn unlock(&self) {
        self.state.lock().unwrap().locked_for_emergency = false;
        info!("laser unlocked");
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().status == LaserStatus::Enabled
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().unwrap().locked_for_emergency
    }

    pub fn status(&self) -> LaserStatus {
        self.state.lock().unwrap().status
    }

    /// Best-effort shutdown: drive the line low and release it.
    pub fn teardown(&self) {
        let mut s = self.state.lock().unwrap();
        if let Err(e) = self.hal.set(self.line, 0) {
            warn!(error = %e, "failed to disable laser line during teardown");
        }
        s.status = LaserStatus::Disabled;
        if let Err(e) = self.hal.release(self.line) {
            warn!(error = %e, "failed to release laser line during teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use turret_hal::SimulatedBackend;

    fn controller() -> LaserController {
        let hal: Arc<dyn HalBackend> = Arc::new(SimulatedBackend::new());
        let line = hal.get_output(0, "laser").unwrap();
        LaserController::new(hal, line)
    }

    #[test]
    fn enable_then_disable() {
        let c = controller();
        assert!(c.enable().is_ok());
        assert!(c.is_enabled());
        assert!(c.disable().is_ok());
        assert!(!c.is_enabled());
    }

    #[test]
    fn double_enable_is_bad_request() {
        let c = controller();
        c.enable().unwrap();
        assert!(matches!(c.enable(), Err(TurretError::BadRequest(_))));
    }

    #[test]
    fn double_disable_is_bad_request() {
        let c = controller();
        assert!(matches!(c.disable(), Err(TurretError::BadRequest(_))));
    }

    #[test]
    fn enable_rejected_while_locked() {
        let c = controller();
        c.emergency_disable_and_lock();
        assert!(matches!(c.enable(), Err(TurretError::Locked(_))));
    }

    #[test]
    fn disable_succeeds_while_locked() {
        let c = controller();
        c.enable().unwrap();
        c.emergency_disable_and_lock();
        // already disabled by the emergency path; a second disable is BadRequest,
        // not Locked — disable never fails due to lock state.
        assert!(matches!(c.disable(), Err(TurretError::BadRequest(_))));
    }

    #[test]
    fn emergency_disable_swallows_already_off() {
        let c = controller();
        // Already disabled; emergency path must not panic or surface an error.
        c.emergency_disable_and_lock();
        assert!(c.is_locked());
        assert!(!c.is_enabled());
    }

    #[test]
    fn unlock_does_not_change_line_state() {
        let c = controller();
        c.enable().unwrap();
        c.emergency_disable_and_lock();
        c.unlock();
        assert!(!c.is_locked());
        assert!(!c.is_enabled());
    }
}
