// ── Core error types ──
//
// User-facing errors from omvault-core. Consumers never see transport
// internals; the `From<ErrorKind>` impl carries the API layer's stable
// failure classification through unchanged, so a setup flow can show
// "wrong password" instead of a generic failure.

use omvault_api::ErrorKind;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Cannot connect to appliance: {code}")]
    ConnectionFailed { code: String },

    #[error("Appliance disconnected")]
    Disconnected,

    #[error("Plugin not installed: {plugin}")]
    PluginNotInstalled { plugin: String },

    #[error("Command rejected by appliance: {message}")]
    CommandRejected { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<ErrorKind> for CoreError {
    fn from(kind: ErrorKind) -> Self {
        Self::ConnectionFailed { code: kind.code() }
    }
}
