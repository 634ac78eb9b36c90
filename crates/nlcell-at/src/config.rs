//! Interface configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::response::DEFAULT_NEWLINE;

/// Configuration for an [`Interface`](crate::Interface).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Serial line rate.
    pub baud_rate: u32,

    /// Enable RTS/CTS flow control.
    pub flow_control: bool,

    /// Default deadline for replies and notifications (milliseconds).
    pub timeout_ms: u64,

    /// Terminator appended to outgoing commands.
    pub send_terminator: String,

    /// Terminator separating reply lines.
    pub newline: String,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        InterfaceConfig {
            baud_rate: 115_200,
            flow_control: false,
            timeout_ms: 5_000,
            send_terminator: "\r".to_string(),
            newline: DEFAULT_NEWLINE.to_string(),
        }
    }
}

impl InterfaceConfig {
    /// Set the line rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Enable or disable hardware flow control.
    pub fn with_flow_control(mut self, enabled: bool) -> Self {
        self.flow_control = enabled;
        self
    }

    /// Set the default deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The default deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
