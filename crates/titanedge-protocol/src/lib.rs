//! Typed configuration messages for Titan Edge encoders and decoders.
//!
//! - [`builder`]: validating fluent builders producing non-empty batches
//! - [`message`]: immutable message values, one field mutation each
//! - [`catalog`]: closed kind-to-shape registry used to encode and decode
//! - [`envelope`] / [`wire`]: routed envelopes and their binary framing
//!
//! Payloads are JSON. Every kind's shape is compiled to a strict JSON Schema
//! so a receiver rejects anything it does not recognise instead of guessing.

pub mod builder;
pub mod catalog;
pub mod enums;
pub mod envelope;
pub mod error;
pub mod message;
pub mod wire;

pub use builder::{
    ConfigBatch, ConfigSink, InputConfiguration, OutputConfiguration, DEFAULT_BUFFER_DURATION_MS,
    DEFAULT_CUSTOM_SKEW_MS, DEFAULT_IP_PORT, DEFAULT_SMPTE_2022_7_IP,
};
pub use catalog::{FieldSpec, FieldType, MessageCatalog, MessageKind, PayloadShape};
pub use enums::{
    AccelerationType, ColorimetryConversion, ConfigMode, InputType, IutName, SdiType, SmpteSkew,
    SourceSpecificMulticastMode, WireToken,
};
pub use envelope::{Envelope, RawMessage};
pub use error::{ArgumentError, ConfigError, ProtocolError, Result, StateError, ValidationError};
pub use message::{
    ConfigCommand, ConfigMessage, ConfigReply, FieldValue, Message, ReplyOutcome, Target,
};
#[cfg(feature = "async")]
pub use wire::EnvelopeCodec;
pub use wire::{
    decode_frame, encode_frame, WireConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, WIRE_VERSION,
};
