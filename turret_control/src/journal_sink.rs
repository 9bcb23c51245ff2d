//! A minimal seam the control plane journals safety events through,
//! decoupling it from the concrete (SQLite-backed) journal crate.

use turret_common::model::EventKind;

pub trait JournalSink: Send + Sync {
    fn record(&self, kind: EventKind, source: &str, description: &str);
}
