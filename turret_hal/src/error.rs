//! Device-level error type.

use thiserror::Error;

/// Error returned by a [`crate::HalBackend`] operation. All operations
/// fail atomically — no partial state is left behind on an OS denial.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open chip {chip}: {source}")]
    ChipOpen {
        chip: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to request line {offset} ({consumer}): {source}")]
    LineRequest {
        offset: u32,
        consumer: String,
        #[source]
        source: gpio_cdev::Error,
    },

    #[error("line I/O error: {0}")]
    LineIo(#[from] gpio_cdev::Error),

    #[error("pwm I/O error: {0}")]
    PwmIo(#[source] std::io::Error),

    #[error("unknown line or channel handle")]
    UnknownHandle,

    #[error("cancelled")]
    Cancelled,
}
