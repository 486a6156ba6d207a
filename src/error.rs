//! vwgen Error Types

use thiserror::Error;

/// Result type alias for vwgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// `ENOENT`, returned by the CLI when a network or node cannot be found
pub const EXIT_NOT_FOUND: i32 = 2;

/// vwgen error types
#[derive(Error, Debug)]
pub enum Error {
    // Lookup errors
    #[error("Unable to find configuration file '{0}.conf'")]
    NetworkNotFound(String),

    #[error("Network '{network}' does not have node '{node}'")]
    NodeNotFound { network: String, node: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NetworkNotFound(_) | Error::NodeNotFound { .. } => EXIT_NOT_FOUND,
            _ => 1,
        }
    }

    /// Check if this error means the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        self.exit_code() == EXIT_NOT_FOUND
    }
}
