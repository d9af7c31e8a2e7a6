use std::time::Duration;

use titanedge_protocol::{ArgumentError, ConfigBatch, ConfigError, ConfigSink, Message};
use titanedge_transport::{ElementInfo, ElementRef};

use crate::channel::{CorrelatedChannel, Replies, SendOutcome};
use crate::config::PROTOCOL_NAME;
use crate::error::{Result, RpcError};

/// A channel bound to one verified Titan Edge element.
///
/// Builders send through it via [`ConfigSink`].
#[derive(Debug, Clone)]
pub struct TitanEdgeClient {
    channel: CorrelatedChannel,
    element: ElementInfo,
    target: ElementRef,
}

impl TitanEdgeClient {
    /// Resolve `element` and check that it runs the Titan Edge protocol.
    pub fn connect(channel: CorrelatedChannel, element: ElementRef) -> Result<Self> {
        match &element {
            ElementRef::Id {
                agent_id,
                element_id,
            } => {
                check_id("agent_id", *agent_id)?;
                check_id("element_id", *element_id)?;
            }
            ElementRef::Name(name) => {
                if name.trim().is_empty() {
                    return Err(ArgumentError::EmptyName.into());
                }
            }
        }

        let info = channel.resolve(&element)?;
        if info.protocol != PROTOCOL_NAME {
            return Err(RpcError::ProtocolMismatch {
                element: element.to_string(),
                expected: PROTOCOL_NAME,
                actual: info.protocol,
            });
        }

        tracing::debug!(
            element = %element,
            agent_id = info.agent_id,
            element_id = info.element_id,
            "connected"
        );
        let target = ElementRef::id(info.agent_id, info.element_id);
        Ok(Self {
            channel,
            element: info,
            target,
        })
    }

    pub fn element(&self) -> &ElementInfo {
        &self.element
    }

    pub fn channel(&self) -> &CorrelatedChannel {
        &self.channel
    }

    pub fn send(&self, messages: &[Message]) -> Result<SendOutcome> {
        self.channel.send_bulk(&self.target, messages)
    }

    pub fn request(
        &self,
        timeout: Duration,
        messages: &[Message],
        expected: Option<usize>,
    ) -> Result<Replies> {
        self.channel
            .request(&self.target, timeout, messages, expected)
    }
}

impl ConfigSink for TitanEdgeClient {
    fn send_batch(&self, batch: ConfigBatch) -> std::result::Result<(), ConfigError> {
        self.channel
            .send_batch(&self.target, &batch)
            .map(|_| ())
            .map_err(|err| ConfigError::Delivery(Box::new(err)))
    }
}

fn check_id(field: &'static str, value: i32) -> Result<()> {
    if value <= 0 {
        return Err(ArgumentError::InvalidId { field, value }.into());
    }
    Ok(())
}
