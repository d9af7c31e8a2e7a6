//! Bus and element directory abstractions for Titan Edge messaging.
//!
//! The configuration protocol rides on a pub/sub bus it does not own. This
//! crate defines the narrow surface it needs from that bus:
//! - [`Bus`]: addressed, correlation-tagged delivery of opaque payloads
//! - [`TargetLookup`]: resolution of element references to ids and state
//!
//! [`InMemoryBus`] and [`StaticDirectory`] implement both in-process.

pub mod address;
pub mod bus;
pub mod directory;
pub mod error;

pub use address::{Address, CorrelationId, ReturnAddress, Source};
pub use bus::{Bus, Delivery, InMemoryBus, Inbox};
pub use directory::{ElementInfo, ElementRef, ElementState, StaticDirectory, TargetLookup};
pub use error::{Result, TransportError};
