//! Error types for the modem driver.

use nlcell_at::{AtError, Response, ResultCode};
use thiserror::Error;

/// Errors that can occur when driving a modem.
#[derive(Debug, Error)]
pub enum ModemError {
    /// The AT channel failed or a wait timed out.
    #[error("AT transport error: {0}")]
    At(#[from] AtError),

    /// A reply did not have the expected shape.
    #[error("{message}: {text:?}")]
    Protocol { message: String, text: String },

    /// The modem answered with something other than `OK`.
    #[error("{message} ({})", .response.result())]
    Device {
        message: String,
        response: Box<Response>,
    },

    /// The call was not valid for the current arguments or state.
    #[error("usage error: {0}")]
    Usage(String),

    /// The operation is not available on this modem model.
    #[error("not supported: {0}")]
    Unsupported(String),

    /// A registry lookup matched nothing.
    #[error("no {kind} matches {key:?}")]
    NotFound { kind: &'static str, key: String },

    /// A registry lookup matched more than one entry.
    #[error("{key:?} matches more than one {kind}")]
    Ambiguous { kind: &'static str, key: String },

    /// No boot marker arrived in time.
    #[error("failed to detect boot")]
    NoBoot,

    /// A socket was misused.
    #[error(transparent)]
    Socket(#[from] SocketError),

    /// A firmware update could not be started or did not complete.
    #[error(transparent)]
    Dfu(#[from] DfuError),

    /// A firmware update URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ModemError {
    /// A malformed reply.
    pub fn protocol(message: impl Into<String>, text: impl Into<String>) -> Self {
        ModemError::Protocol {
            message: message.into(),
            text: text.into(),
        }
    }

    /// A reply whose result was not `OK`.
    pub fn device(message: impl Into<String>, response: Response) -> Self {
        ModemError::Device {
            message: message.into(),
            response: Box::new(response),
        }
    }

    /// A usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        ModemError::Usage(message.into())
    }

    /// The device result carried by this error, if the modem answered.
    pub fn result(&self) -> Option<ResultCode> {
        match self {
            ModemError::Device { response, .. } => Some(response.result()),
            ModemError::Socket(SocketError::ConnectFailed {
                response: Some(response),
                ..
            }) => Some(response.result()),
            _ => None,
        }
    }

    /// Whether this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ModemError::At(e) if e.is_timeout())
    }
}

/// Fail with a device error unless the reply is `OK`.
pub(crate) fn expect_ok(response: Response, message: &str) -> Result<Response> {
    if response.is_ok() {
        Ok(response)
    } else {
        Err(ModemError::device(message, response))
    }
}

/// Socket usage errors, raised before or instead of wire traffic.
#[derive(Debug, Error)]
pub enum SocketError {
    /// `send`/`recv` on a socket that is not connected.
    #[error("socket is not connected")]
    NotConnected,

    /// Every connection id in the pool is in use.
    #[error("no free socket ids")]
    PoolExhausted,

    /// A receive size outside what the dialect accepts.
    #[error("invalid receive size {size} (must be {min}..={max})")]
    InvalidSize { size: usize, min: usize, max: usize },

    /// Binding to a socket id the modem does not know.
    #[error("no socket with id {0} on the modem")]
    UnknownFileno(u32),

    /// The modem reported that the connection could not be made.
    ///
    /// `response` is the refusing reply, when there was one.
    #[error(
        "failed to connect to {address}{}",
        .response.as_ref().map(|r| format!(" ({})", r.result())).unwrap_or_default()
    )]
    ConnectFailed {
        address: String,
        response: Option<Box<Response>>,
    },
}

impl SocketError {
    /// A failed connection, keeping the modem's reply if there was one.
    pub fn connect_failed(address: impl Into<String>, response: Option<Response>) -> Self {
        SocketError::ConnectFailed {
            address: address.into(),
            response: response.map(Box::new),
        }
    }
}

/// Firmware update failures.
#[derive(Debug, Error)]
pub enum DfuError {
    /// The modem reported a failure code.
    #[error("firmware update failed with code {code}")]
    Failed { code: u32 },

    /// The chunked transfer reported failure.
    #[error("firmware transfer failed")]
    TransferFailed,

    /// Neither the AT channel nor the debug probe could start the update.
    #[error("failed to trigger firmware update")]
    NoTrigger,

    /// No kernel-log channel is attached to carry the payload.
    #[error("no kernel log channel for firmware transfer")]
    NoLogChannel,

    /// A `DFU:` notification that does not belong at this point.
    #[error("unexpected DFU notification {0:?}")]
    Unexpected(String),

    /// The modem booted but never reported completion.
    #[error("firmware update did not report completion")]
    Incomplete,
}

/// Result type alias for modem operations.
pub type Result<T> = std::result::Result<T, ModemError>;
