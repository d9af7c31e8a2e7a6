use crate::address::Address;
use crate::directory::ElementRef;

/// Errors that can occur in bus and directory operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The element reference did not resolve to a known element.
    #[error("element not found: {0}")]
    ElementNotFound(ElementRef),

    /// Another inbox is already bound to this address.
    #[error("address already bound: {0}")]
    AddressInUse(Address),

    /// The bus has shut down or the inbox lost its sending side.
    #[error("bus closed")]
    Closed,

    /// A blocking receive did not complete in time.
    #[error("receive timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, TransportError>;
