//! Event journal record shape.

use serde::{Deserialize, Serialize};

/// Kind of a journaled safety event. Stored as an integer in the
/// `Events.EVENT` column; the discriminant values are part of the
/// on-disk format and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum EventKind {
    EmergencyLock = 0,
    LockReasonAdded = 1,
    LockReasonRemoved = 2,
    EmergencyUnlock = 3,
    CalibrationStart = 4,
    CalibrationEnd = 5,
    Elimination = 6,
}

impl EventKind {
    pub fn from_i64(v: i64) -> Option<Self> {
        Some(match v {
            0 => Self::EmergencyLock,
            1 => Self::LockReasonAdded,
            2 => Self::LockReasonRemoved,
            3 => Self::EmergencyUnlock,
            4 => Self::CalibrationStart,
            5 => Self::CalibrationEnd,
            6 => Self::Elimination,
            _ => return None,
        })
    }
}

/// One append-only journal record. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Wall-clock seconds.
    pub timestamp: i64,
    pub kind: EventKind,
    /// The reason/caller that produced this event, e.g. `"RESTApi"`.
    pub source: String,
    pub description: String,
}
