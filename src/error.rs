//! Error types for the editor core

use thiserror::Error;

/// Result type alias for editor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while editing, previewing, or persisting rendrs
#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// The remote API answered with a non-success status
    #[error("Request to {url} failed with status {status}")]
    Http { status: u16, url: String },

    /// A response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Template compilation or rendering failed
    #[error("Template error: {0}")]
    Template(String),

    /// The preview frame could not be written or measured
    #[error("Rendering failed: {0}")]
    Render(String),

    /// Failed to execute a preview script
    #[error("Script execution failed: {0}")]
    Script(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Local option storage could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An edit was attempted on a buffer that has not been loaded yet
    #[error("Editor buffer is read-only")]
    ReadOnly,

    /// The operation needs a loaded library
    #[error("No library loaded")]
    NoLibrary,

    /// The operation needs a loaded rendr
    #[error("No rendr loaded")]
    NoDocument,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Network(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Error::Decode(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<mustache::Error> for Error {
    fn from(err: mustache::Error) -> Self {
        Error::Template(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("invalid URL: {}", err))
    }
}
