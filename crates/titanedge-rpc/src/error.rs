use titanedge_protocol::{ArgumentError, ProtocolError};
use titanedge_transport::TransportError;

/// Errors that can occur in channel and dispatcher operations.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Bus or directory error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Encoding, decoding, or framing error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    Argument(#[from] ArgumentError),

    /// The element runs a different protocol than the client speaks.
    #[error("element {element} runs protocol '{actual}' (expected '{expected}')")]
    ProtocolMismatch {
        element: String,
        expected: &'static str,
        actual: String,
    },

    /// A send or request was given no messages.
    #[error("request contains no messages")]
    EmptyRequest,

    /// Channel configuration could not be parsed.
    #[error("invalid channel config: {0}")]
    Config(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;
