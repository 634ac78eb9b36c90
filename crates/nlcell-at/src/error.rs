//! Error types for the AT command engine.

use thiserror::Error;

/// Transport and communication errors raised by the AT engine.
///
/// Device-reported failures are not errors at this layer: a command that ends
/// in `ERROR` still produces a [`Response`](crate::Response) whose result the
/// caller inspects.
#[derive(Debug, Error)]
pub enum AtError {
    /// The underlying channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial device could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The channel accepted fewer bytes than were written.
    #[error("short write: wrote {written} of {expected} bytes")]
    WriteFailed { written: usize, expected: usize },

    /// A deadline elapsed before the awaited data arrived.
    #[error("timeout waiting for {0}")]
    Timeout(String),

    /// A notification or prompt pattern failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl AtError {
    /// Whether this error is a deadline expiry rather than a channel failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AtError::Timeout(_))
    }
}

/// Result type alias for AT engine operations.
pub type AtResult<T> = Result<T, AtError>;
