//! Shared error kinds for the turret control core.
//!
//! Propagation policy (see the component design notes): `LockedError`
//! and `BadRequest` are caller mistakes surfaced to the HTTP layer as
//! 400s and never kill a worker thread; `DeviceError` during
//! steady-state operation is logged and, for the laser, a best-effort
//! disable is attempted; `NotInitialized` marks use-before-init bugs;
//! `PersistenceError` leaves the journal buffer intact for retry.

use thiserror::Error;

/// Unified error type returned by controllers across the core.
#[derive(Debug, Error)]
pub enum TurretError {
    /// OS-level I/O failure on a GPIO line, PWM channel, or the journal DB.
    #[error("device error: {0}")]
    Device(String),

    /// The action was refused because the interlock is engaged.
    #[error("locked: {0}")]
    Locked(String),

    /// Caller input was out of range or malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Operation invoked before the subsystem finished initialization.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// Journal DB open or flush failure.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl TurretError {
    /// True for the two caller-facing kinds that never indicate a fault
    /// in the turret itself (`LockedError`, `BadRequest`).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, TurretError::Locked(_) | TurretError::BadRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, TurretError>;
