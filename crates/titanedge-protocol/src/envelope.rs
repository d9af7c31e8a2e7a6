use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use titanedge_transport::{CorrelationId, ReturnAddress, Source};

use crate::error::Result;
use crate::wire::{decode_exact, encode_frame};

/// One catalog-encoded message inside an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub kind: String,
    pub payload: Value,
}

/// Routing wrapper around a batch or a single message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Where replies to this envelope should be sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_address: Option<ReturnAddress>,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

impl Envelope {
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            source: None,
            return_address: None,
            messages: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_return_address(mut self, address: ReturnAddress) -> Self {
        self.return_address = Some(address);
        self
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Encode as a single wire frame.
    pub fn to_bytes(&self, max_payload: usize) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        encode_frame(self, &mut buf, max_payload)?;
        Ok(buf.freeze())
    }

    /// Decode a buffer holding exactly one wire frame.
    pub fn from_bytes(bytes: &[u8], max_payload: usize) -> Result<Self> {
        decode_exact(bytes, max_payload)
    }
}

#[cfg(test)]
mod tests {
    use titanedge_transport::Address;

    use super::*;
    use crate::wire::DEFAULT_MAX_PAYLOAD;

    #[test]
    fn optional_routing_fields_are_omitted() {
        let json = serde_json::to_value(Envelope::new(CorrelationId(5))).unwrap();
        assert_eq!(json, serde_json::json!({ "correlationId": 5, "messages": [] }));
    }

    #[test]
    fn bytes_roundtrip_keeps_routing_metadata() {
        let envelope = Envelope::new(CorrelationId(77))
            .with_source(Source::new("scheduler", 12, 34))
            .with_return_address(Address::new(12, 34, 9_000_001));

        let bytes = envelope.to_bytes(DEFAULT_MAX_PAYLOAD).unwrap();
        let back = Envelope::from_bytes(&bytes, DEFAULT_MAX_PAYLOAD).unwrap();
        assert_eq!(back, envelope);
        assert!(back.is_empty());
    }
}
