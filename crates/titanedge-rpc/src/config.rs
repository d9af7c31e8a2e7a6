use std::time::Duration;

use serde::{Deserialize, Serialize};
use titanedge_protocol::DEFAULT_MAX_PAYLOAD;
use titanedge_transport::Source;

use crate::error::{Result, RpcError};

/// Protocol name Titan Edge elements report.
pub const PROTOCOL_NAME: &str = "Ateme Titan Edge";

/// Parameter on the device that receives configuration envelopes.
pub const RECEIVER_PARAMETER: i32 = 9_000_000;

/// Parameter on the sender that receives replies.
pub const RESPONSE_PARAMETER: i32 = 9_000_001;

/// Default sliding reply timeout.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Addressing and timing for a [`CorrelatedChannel`](crate::CorrelatedChannel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Identity stamped on outgoing envelopes; replies return to it. When
    /// unset, replies return to the target element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Parameter id envelopes are delivered to on the target element.
    pub receiver_parameter: i32,
    /// Parameter id on `source` that receives replies.
    pub response_parameter: i32,
    /// Sliding wait applied per reply when no timeout is given explicitly.
    #[serde(rename = "reply_timeout_ms", with = "millis")]
    pub reply_timeout: Duration,
    /// Maximum encoded envelope body size in bytes.
    pub max_payload_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            source: None,
            receiver_parameter: RECEIVER_PARAMETER,
            response_parameter: RESPONSE_PARAMETER,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ChannelConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(RpcError::Config)
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
