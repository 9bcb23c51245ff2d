//! Safety-interlocked control plane: laser, servos, aim coordination,
//! the emergency interlock, and the perception loop that drives them.

pub mod aim;
pub mod interlock;
pub mod journal_sink;
pub mod laser;
pub mod perception;
pub mod servo;

pub use aim::AimCoordinator;
pub use interlock::InterlockManager;
pub use journal_sink::JournalSink;
pub use laser::{LaserController, LaserStatus};
pub use servo::ServoController;
