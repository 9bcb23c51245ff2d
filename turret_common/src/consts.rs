//! System-wide tunable constants.
//!
//! These mirror the literal values used in the end-to-end scenarios:
//! a 5 s unlock delay, a 1 s shoot-sustain window, and a 0.40 score
//! floor on detector proposals.

use std::time::Duration;

/// Minimum detector confidence for a proposal to be considered.
pub const SCORE_THRESHOLD: f32 = 0.40;

/// Release-delay hysteresis: a reason must be continuously absent for
/// this long before the Interlock Manager clears it.
pub const UNLOCK_DELAY: Duration = Duration::from_millis(5000);

/// Minimum interval between logged eliminations / automatic disarms.
pub const SHOOT_SUSTAIN: Duration = Duration::from_millis(1000);

/// Polling granularity for release-delay tasks and the button watcher.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Interval between JPEG parts pushed to an `/video` subscriber.
pub const VIDEO_STREAM_INTERVAL: Duration = Duration::from_millis(100);

/// Square model input size the detector expects (pixels).
pub const MODEL_INPUT_SIZE: u32 = 512;

/// Event journal in-memory buffer capacity before a forced flush.
pub const JOURNAL_BUFFER_CAP: usize = 255;

/// Event journal time-based flush interval.
pub const JOURNAL_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Servo PWM frequency.
pub const SERVO_FREQUENCY_HZ: u32 = 50;

/// Minimum servo pulse width, corresponding to angle 0°.
pub const SERVO_PULSE_MIN_US: u32 = 500;

/// Maximum servo pulse width, corresponding to angle 180°.
pub const SERVO_PULSE_MAX_US: u32 = 2500;

/// Reason string used by the physical emergency button.
pub const REASON_DEAD_LOCKER: &str = "DeadLocker";

/// Reason string used by the perception loop's detector.
pub const REASON_NEURAL_NETWORK_HANDLER: &str = "NeuralNetworkHandler";

/// Reason string used by the REST API's manual veto.
pub const REASON_REST_API: &str = "RESTApi";

/// Reason string used by the signal handler on shutdown.
pub const REASON_MAIN: &str = "main";
