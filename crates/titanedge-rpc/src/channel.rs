use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use titanedge_protocol::{ConfigBatch, Envelope, Message, MessageCatalog};
use titanedge_transport::{
    Address, Bus, CorrelationId, Delivery, ElementInfo, ElementRef, ElementState, Inbox,
    TargetLookup, TransportError,
};

use crate::config::ChannelConfig;
use crate::error::{Result, RpcError};

/// Result of a fire-and-forget send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The envelope was handed to the bus.
    Sent(CorrelationId),
    /// The target was not active; nothing was sent.
    Dropped { state: ElementState },
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// Client-side channel for bulk sends and correlated requests.
#[derive(Clone)]
pub struct CorrelatedChannel {
    bus: Arc<dyn Bus>,
    directory: Arc<dyn TargetLookup>,
    catalog: Arc<MessageCatalog>,
    config: ChannelConfig,
}

impl CorrelatedChannel {
    pub fn new(
        bus: Arc<dyn Bus>,
        directory: Arc<dyn TargetLookup>,
        catalog: Arc<MessageCatalog>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            bus,
            directory,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<MessageCatalog> {
        &self.catalog
    }

    /// Look up `target` in the directory.
    pub fn resolve(&self, target: &ElementRef) -> Result<ElementInfo> {
        Ok(self.directory.resolve(target)?)
    }

    /// Address replies from `target` arrive on.
    ///
    /// With a configured source this is the source's response parameter.
    /// Otherwise replies return to the response parameter on the target
    /// element itself.
    pub fn reply_address(&self, target: &ElementInfo) -> Address {
        match &self.config.source {
            Some(source) => source.reply_address(self.config.response_parameter),
            None => Address::new(
                target.agent_id,
                target.element_id,
                self.config.response_parameter,
            ),
        }
    }

    /// Send `messages` to `target` in one envelope, in order.
    ///
    /// Returns [`SendOutcome::Dropped`] without sending when the target is
    /// not active.
    pub fn send_bulk(&self, target: &ElementRef, messages: &[Message]) -> Result<SendOutcome> {
        if messages.is_empty() {
            return Err(RpcError::EmptyRequest);
        }

        let info = self.resolve(target)?;
        if !info.is_active() {
            tracing::info!(
                element = %target,
                state = ?info.state,
                dropped = messages.len(),
                "target not active, dropping batch"
            );
            return Ok(SendOutcome::Dropped { state: info.state });
        }

        let correlation = CorrelationId::next();
        self.dispatch(&info, correlation, messages)?;
        Ok(SendOutcome::Sent(correlation))
    }

    /// Send a single message. Same semantics as [`send_bulk`](Self::send_bulk).
    pub fn send_message(&self, target: &ElementRef, message: &Message) -> Result<SendOutcome> {
        self.send_bulk(target, std::slice::from_ref(message))
    }

    /// Send a built configuration batch.
    pub fn send_batch(&self, target: &ElementRef, batch: &ConfigBatch) -> Result<SendOutcome> {
        self.send_bulk(target, &batch.to_messages())
    }

    /// Send `messages` and collect correlated replies.
    ///
    /// `timeout` is a sliding window: it starts when the request is sent and
    /// restarts each time a reply arrives. Collection also stops once
    /// `expected` replies have been yielded. A timeout too large to add to
    /// the current instant waits without a deadline.
    ///
    /// The subscription is opened before sending, so early replies are not
    /// missed. An empty result does not distinguish a silent target from
    /// an unreachable one.
    pub fn request(
        &self,
        target: &ElementRef,
        timeout: Duration,
        messages: &[Message],
        expected: Option<usize>,
    ) -> Result<Replies> {
        if messages.is_empty() {
            return Err(RpcError::EmptyRequest);
        }

        let info = self.resolve(target)?;
        let correlation = CorrelationId::next();
        let inbox = self.bus.subscribe(self.reply_address(&info), correlation)?;

        self.dispatch(&info, correlation, messages)?;

        Ok(Replies {
            inbox,
            catalog: Arc::clone(&self.catalog),
            correlation,
            timeout,
            deadline: Instant::now().checked_add(timeout),
            remaining: expected,
            pending: VecDeque::new(),
            max_payload: self.config.max_payload_size,
            done: false,
        })
    }

    /// [`request`](Self::request) using the configured reply timeout.
    pub fn request_default(
        &self,
        target: &ElementRef,
        messages: &[Message],
        expected: Option<usize>,
    ) -> Result<Replies> {
        self.request(target, self.config.reply_timeout, messages, expected)
    }

    fn dispatch(
        &self,
        info: &ElementInfo,
        correlation: CorrelationId,
        messages: &[Message],
    ) -> Result<()> {
        let mut envelope = Envelope::new(correlation).with_return_address(self.reply_address(info));
        if let Some(source) = &self.config.source {
            envelope = envelope.with_source(source.clone());
        }
        let bytes = self
            .catalog
            .seal(envelope, messages)?
            .to_bytes(self.config.max_payload_size)?;

        let destination = Address::new(
            info.agent_id,
            info.element_id,
            self.config.receiver_parameter,
        );
        self.bus.send(destination, correlation, bytes)?;

        tracing::debug!(
            bus = self.bus.name(),
            destination = %destination,
            correlation = %correlation,
            messages = messages.len(),
            "sent envelope"
        );
        Ok(())
    }
}

impl std::fmt::Debug for CorrelatedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelatedChannel")
            .field("bus", &self.bus.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Lazily collected replies to one request.
///
/// Each call to `next` waits at most the sliding timeout for the next reply.
/// Dropping the iterator releases the reply subscription.
#[derive(Debug)]
pub struct Replies {
    inbox: Inbox,
    catalog: Arc<MessageCatalog>,
    correlation: CorrelationId,
    timeout: Duration,
    /// `None` when the timeout overflows `Instant`.
    deadline: Option<Instant>,
    remaining: Option<usize>,
    pending: VecDeque<Message>,
    max_payload: usize,
    done: bool,
}

impl Replies {
    pub fn correlation(&self) -> CorrelationId {
        self.correlation
    }

    fn receive(&mut self) -> bool {
        let delivery = match self.inbox.try_recv() {
            Some(delivery) => delivery,
            None => match self.wait() {
                Ok(delivery) => delivery,
                Err(TransportError::Timeout(_)) => {
                    tracing::debug!(correlation = %self.correlation, "reply window elapsed");
                    return false;
                }
                Err(err) => {
                    tracing::debug!(
                        correlation = %self.correlation,
                        error = %err,
                        "reply inbox closed"
                    );
                    return false;
                }
            },
        };

        self.deadline = Instant::now().checked_add(self.timeout);

        let envelope = match Envelope::from_bytes(&delivery.payload, self.max_payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(
                    correlation = %self.correlation,
                    error = %err,
                    "skipping malformed reply"
                );
                return true;
            }
        };
        for decoded in self.catalog.open(&envelope) {
            match decoded {
                Ok(message) => self.pending.push_back(message),
                Err(err) => {
                    tracing::warn!(
                        correlation = %self.correlation,
                        error = %err,
                        "skipping undecodable reply"
                    );
                }
            }
        }
        true
    }

    fn wait(&self) -> std::result::Result<Delivery, TransportError> {
        match self.deadline {
            Some(deadline) => self
                .inbox
                .recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => self.inbox.recv(),
        }
    }

    /// Turn the remaining replies into an async stream.
    ///
    /// Collection runs on Tokio's blocking pool; must be called from within
    /// a Tokio runtime.
    #[cfg(feature = "async")]
    pub fn into_stream(self) -> ReplyStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            for reply in self {
                if tx.send(reply).is_err() {
                    break;
                }
            }
        });
        ReplyStream { receiver: rx }
    }
}

impl Iterator for Replies {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        loop {
            if self.done || self.remaining == Some(0) {
                self.done = true;
                return None;
            }
            if let Some(message) = self.pending.pop_front() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Some(message);
            }
            if !self.receive() {
                self.done = true;
                return None;
            }
        }
    }
}

/// Async view of [`Replies`].
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct ReplyStream {
    receiver: tokio::sync::mpsc::UnboundedReceiver<Message>,
}

#[cfg(feature = "async")]
impl futures_core::Stream for ReplyStream {
    type Item = Message;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Message>> {
        self.receiver.poll_recv(cx)
    }
}
