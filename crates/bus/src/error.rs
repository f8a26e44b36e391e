//! Bus error types.

use events::CodecError;
use thiserror::Error;

/// Errors raised by broker operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Connecting, opening a channel or declaring the exchange failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The broker refused or never confirmed a publish.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Declaring, binding or consuming a queue failed.
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Convenience type alias for bus results.
pub type Result<T> = std::result::Result<T, BusError>;
