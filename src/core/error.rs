//! Error types for the Convoy protocol.

use thiserror::Error;

use crate::arq::WindowError;
use crate::transport::HeaderError;

/// Top-level Convoy errors.
#[derive(Debug, Error)]
pub enum ConvoyError {
    /// Send window error.
    #[error("window error: {0}")]
    Window(#[from] WindowError),

    /// Packet header error.
    #[error("header error: {0}")]
    Header(#[from] HeaderError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
