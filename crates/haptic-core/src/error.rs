use std::net::SocketAddr;

use thiserror::Error;

/// Top-level error type for the haptic bridge.
///
/// Only startup failures (config, bind) are surfaced to callers. Everything
/// raised while the listener is running is logged and absorbed by the loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HapticError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind OSC listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("OSC listener is already running")]
    AlreadyRunning,

    #[error("Invalid listener transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Malformed OSC packet: {0}")]
    Decode(String),

    #[error("Event handler failed: {0}")]
    Handler(String),
}

impl From<toml::de::Error> for HapticError {
    fn from(err: toml::de::Error) -> Self {
        HapticError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HapticError {
    fn from(err: toml::ser::Error) -> Self {
        HapticError::Config(err.to_string())
    }
}

/// A specialized `Result` type for haptic bridge operations.
pub type Result<T> = std::result::Result<T, HapticError>;
