//! Tool configuration file.
//!
//! ```yaml
//! port: /dev/ttyACM0
//! kernel_log: /dev/ttyACM1
//! interface:
//!   baud_rate: 115200
//!   timeout_ms: 5000
//! modem:
//!   model: nano
//!   dfu:
//!     boot_ms: 120000
//! transfer:
//!   timeout_ms: 10000
//!   retries: 16
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use nlcell_at::InterfaceConfig;
use nlcell_modem::ModemConfig;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Default AT port.
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Everything the tool needs to reach a modem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// AT command port.
    pub port: String,
    /// Kernel-log port that carries firmware images.
    pub kernel_log: Option<String>,
    pub interface: InterfaceConfig,
    pub modem: ModemConfig,
    pub transfer: TransferConfig,
}

/// XMODEM settings for firmware uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// How long to wait for each receiver reply.
    pub timeout_ms: u64,
    /// Attempts per block before giving up.
    pub retries: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            timeout_ms: 10_000,
            retries: 16,
        }
    }
}

impl TransferConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            port: DEFAULT_PORT.to_string(),
            kernel_log: None,
            interface: InterfaceConfig::default(),
            modem: ModemConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

impl ToolConfig {
    /// Load a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ToolError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ToolError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlcell_modem::Model;

    #[test]
    fn test_defaults() {
        let config: ToolConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.kernel_log.is_none());
        assert_eq!(config.interface.baud_rate, 115_200);
        assert_eq!(config.modem.model, Model::Nano);
        assert_eq!(config.transfer.retries, 16);
    }

    #[test]
    fn test_partial_file() {
        let yaml = "port: /dev/ttyUSB2\nkernel_log: /dev/ttyUSB3\nmodem:\n  model: src7611\n  dfu:\n    boot_ms: 1000\n";
        let config: ToolConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, "/dev/ttyUSB2");
        assert_eq!(config.kernel_log.as_deref(), Some("/dev/ttyUSB3"));
        assert_eq!(config.modem.model, Model::Src7611);
        assert_eq!(config.modem.dfu.boot_ms, 1_000);
        assert_eq!(config.modem.dfu.post_boot_ms, 2_000);
        assert_eq!(config.transfer.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_transfer_section() {
        let config: ToolConfig = serde_yaml::from_str("transfer:\n  retries: 4\n").unwrap();
        assert_eq!(config.transfer.retries, 4);
        assert_eq!(config.transfer.timeout_ms, 10_000);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ToolConfig::load("/nonexistent/nlcell.yaml"),
            Err(ToolError::ReadFile { .. })
        ));
    }
}
