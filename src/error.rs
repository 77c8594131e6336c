//! Error types shared by the engine subsystems
//!
//! Conditions the legacy engines treated as a hard abort (missing resource,
//! no output device) are surfaced here as typed errors so the caller decides
//! how to end the session.

use thiserror::Error;

/// Errors produced by the scheduler, the image cache and the music player
#[derive(Error, Debug)]
pub enum EngineError {
    /// A required resource could not be opened
    #[error("Could not open '{0}'")]
    ResourceNotFound(String),

    /// IO error from the filesystem or terminal
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The image decoder rejected the resource bytes
    #[error("Decode error in '{name}': {message}")]
    Decode { name: String, message: String },

    /// `open` was called without an output driver
    #[error("No output driver configured")]
    NoDriver,

    /// The output driver refused to open
    #[error("Output driver failed to open (status {0})")]
    DeviceOpen(i32),

    /// Host platform failure (screen, input backend)
    #[error("Platform error: {0}")]
    Platform(String),

    /// Invalid configuration file
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Raised by a script host
    #[error("Script error: {0}")]
    Script(String),
}

impl From<toml::de::Error> for EngineError {
    fn from(error: toml::de::Error) -> Self {
        EngineError::Config(error.to_string())
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
