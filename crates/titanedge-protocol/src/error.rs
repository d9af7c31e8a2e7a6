use std::error::Error as StdError;

/// A setter argument broke a domain rule. Raised before anything is queued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Not a strict dotted-quad IPv4 address.
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),

    /// Port outside `1..=65535`.
    #[error("port {0} out of range (1-65535)")]
    PortOutOfRange(i64),

    /// Duration below zero or too large for the wire.
    #[error("duration {0} ms must be between 0 and {max}", max = u32::MAX)]
    NegativeDuration(i64),

    /// Token outside the closed enumeration.
    #[error("undefined {enumeration} value: {value:?}")]
    UndefinedEnumValue {
        enumeration: &'static str,
        value: String,
    },
}

/// The builder is in a state that forbids the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// `build()` or `send()` with nothing accumulated.
    #[error("no configuration messages to send")]
    EmptyBatch,
}

/// A required collaborator or argument is missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    /// `send()` was given no channel.
    #[error("no channel to send the configuration on")]
    NilChannel,

    /// Agent or element id must be positive.
    #[error("{field} must be greater than 0 (got {value})")]
    InvalidId { field: &'static str, value: i32 },

    /// Element name must not be blank.
    #[error("element name must not be empty")]
    EmptyName,
}

/// Failure from a builder's `send()`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// The sink accepted the batch but could not hand it on.
    #[error("delivery failed: {0}")]
    Delivery(#[source] Box<dyn StdError + Send + Sync>),
}

/// Errors while encoding, decoding, or framing messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The kind tag is not part of the catalog.
    #[error("unknown message kind: {0:?}")]
    UnknownMessageKind(String),

    /// The payload does not match the registered shape for its kind.
    #[error("payload for {kind} does not match its shape: {message}")]
    ShapeViolation { kind: &'static str, message: String },

    /// The payload matched its shape but a value could not be mapped back.
    #[error("invalid payload for {kind}: {message}")]
    InvalidPayload { kind: &'static str, message: String },

    /// A registered shape could not be compiled into a validator.
    #[error("failed to compile shape for {kind}: {message}")]
    SchemaCompile { kind: &'static str, message: String },

    /// The frame header contains an invalid magic number.
    #[error("invalid envelope magic (expected 0x5445 \"TE\")")]
    InvalidMagic,

    /// The frame declares a wire version this build cannot read.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u16),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The buffer ended before a complete frame.
    #[error("incomplete envelope frame ({available} of {needed} bytes)")]
    Incomplete { needed: usize, available: usize },

    /// Bytes remain after a complete frame.
    #[error("{0} trailing bytes after envelope frame")]
    TrailingBytes(usize),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error from a framed stream.
    #[error("envelope I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
