use thiserror::Error;

/// Errors shared by the Snap plugin crates.
#[derive(Error, Debug)]
pub enum PluginError {
    /// Raised by plugin callbacks (validation, data or internal errors in
    /// the collection logic). Reported to the host as a failure status.
    #[error("{0}")]
    Fault(String),

    /// Invalid runtime configuration or a config policy violation
    #[error("configuration error: {0}")]
    Config(String),

    /// Writing to the host stream failed
    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding of the preamble or a config file failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl PluginError {
    /// Shorthand for a plugin fault with the given message.
    pub fn fault(message: impl Into<String>) -> Self {
        PluginError::Fault(message.into())
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, PluginError::Fault(_))
    }
}

/// A specialized Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;
