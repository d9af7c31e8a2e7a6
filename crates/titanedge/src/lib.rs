//! Typed configuration messaging for Ateme Titan Edge encoders and decoders.
//!
//! Build a batch with [`protocol::InputConfiguration`] or
//! [`protocol::OutputConfiguration`], then hand it to an
//! [`rpc::TitanEdgeClient`] bound to the target element.
//!
//! # Crate Structure
//!
//! - [`transport`]: bus addressing, in-memory bus, element directory
//! - [`protocol`]: message catalog, builders, envelopes and framing
//! - [`rpc`]: correlated request/response channel and executor dispatch

/// Re-export transport types.
pub mod transport {
    pub use titanedge_transport::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use titanedge_protocol::*;
}

/// Re-export channel, client and dispatcher types.
pub mod rpc {
    pub use titanedge_rpc::*;
}
