//! Errors surfaced by the command line tool.

use nlcell_at::AtError;
use nlcell_modem::ModemError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    /// Talking to the modem failed.
    #[error(transparent)]
    Modem(#[from] ModemError),

    /// Opening or driving a port failed.
    #[error(transparent)]
    At(#[from] AtError),

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is malformed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    /// The modem answered with something other than `OK`.
    #[error("command failed: {0}")]
    CommandFailed(String),
}
