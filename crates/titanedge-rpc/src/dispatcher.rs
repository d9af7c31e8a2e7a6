use std::collections::HashMap;
use std::sync::Arc;

use titanedge_protocol::{Envelope, Message, MessageCatalog, MessageKind, WireConfig};
use titanedge_transport::{Bus, Delivery, Inbox, Source, TransportError};

use crate::error::Result;

/// Error type executors may return. Any error converts with `?`.
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync>;

/// Handler for one message kind.
///
/// Returning `Ok(Some(reply))` sends `reply` back to the envelope's return
/// address under the same correlation id.
pub trait Executor<C>: Send + Sync {
    fn execute(&self, message: &Message, context: &mut C) -> ExecutorResult;
}

/// Outcome of one executor call.
pub type ExecutorResult = std::result::Result<Option<Message>, ExecutorError>;

impl<C, F> Executor<C> for F
where
    F: Fn(&Message, &mut C) -> ExecutorResult + Send + Sync,
{
    fn execute(&self, message: &Message, context: &mut C) -> ExecutorResult {
        self(message, context)
    }
}

/// Counters for one or more handled envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleReport {
    /// Messages an executor ran for.
    pub executed: usize,
    /// Messages of a known kind with no executor attached.
    pub skipped: usize,
    /// Messages that failed to decode.
    pub rejected: usize,
    /// Executors that returned an error.
    pub failed: usize,
    /// Replies delivered to the return address.
    pub replies: usize,
    /// Replies produced but not delivered.
    pub undelivered: usize,
}

impl HandleReport {
    pub fn merge(&mut self, other: HandleReport) {
        self.executed += other.executed;
        self.skipped += other.skipped;
        self.rejected += other.rejected;
        self.failed += other.failed;
        self.replies += other.replies;
        self.undelivered += other.undelivered;
    }
}

/// Routes decoded messages to per-kind executors on the device side.
pub struct Dispatcher<C> {
    catalog: Arc<MessageCatalog>,
    bus: Arc<dyn Bus>,
    executors: HashMap<MessageKind, Box<dyn Executor<C>>>,
    source: Option<Source>,
    wire: WireConfig,
}

impl<C> Dispatcher<C> {
    pub fn new(catalog: Arc<MessageCatalog>, bus: Arc<dyn Bus>) -> Self {
        Self {
            catalog,
            bus,
            executors: HashMap::new(),
            source: None,
            wire: WireConfig::default(),
        }
    }

    /// Stamp outgoing replies with `source`.
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_wire_config(mut self, wire: WireConfig) -> Self {
        self.wire = wire;
        self
    }

    /// Attach a closure for `kind`, replacing any previous executor.
    pub fn attach<F>(&mut self, kind: MessageKind, executor: F) -> &mut Self
    where
        F: Fn(&Message, &mut C) -> ExecutorResult + Send + Sync + 'static,
    {
        self.attach_executor(kind, executor)
    }

    /// Attach `executor` for `kind`, replacing any previous one.
    pub fn attach_executor(
        &mut self,
        kind: MessageKind,
        executor: impl Executor<C> + 'static,
    ) -> &mut Self {
        if self.executors.insert(kind, Box::new(executor)).is_some() {
            tracing::debug!(kind = %kind, "replaced executor");
        }
        self
    }

    /// Remove the executor for `kind`. Returns whether one was attached.
    pub fn detach(&mut self, kind: MessageKind) -> bool {
        self.executors.remove(&kind).is_some()
    }

    pub fn is_attached(&self, kind: MessageKind) -> bool {
        self.executors.contains_key(&kind)
    }

    /// Handle one delivery's payload.
    pub fn handle_delivery(&self, delivery: &Delivery, context: &mut C) -> Result<HandleReport> {
        self.handle(&delivery.payload, context)
    }

    /// Decode a framed envelope and run the executor for each message in order.
    ///
    /// Only a malformed frame is an error. Per-message failures are logged
    /// and counted in the returned report.
    pub fn handle(&self, raw: &[u8], context: &mut C) -> Result<HandleReport> {
        let envelope = Envelope::from_bytes(raw, self.wire.max_payload_size)?;
        let mut report = HandleReport::default();

        for (index, decoded) in self.catalog.open(&envelope).into_iter().enumerate() {
            let message = match decoded {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(
                        correlation = %envelope.correlation_id,
                        index,
                        error = %err,
                        "rejected message"
                    );
                    report.rejected += 1;
                    continue;
                }
            };

            let kind = message.kind();
            let Some(executor) = self.executors.get(&kind) else {
                tracing::debug!(kind = %kind, "no executor attached");
                report.skipped += 1;
                continue;
            };

            report.executed += 1;
            match executor.execute(&message, context) {
                Ok(Some(reply)) => {
                    if self.reply(&envelope, &reply) {
                        report.replies += 1;
                    } else {
                        report.undelivered += 1;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(kind = %kind, error = %err, "executor failed");
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            correlation = %envelope.correlation_id,
            executed = report.executed,
            replies = report.replies,
            "handled envelope"
        );
        Ok(report)
    }

    /// Handle deliveries from `inbox` until it closes.
    pub fn serve(&self, inbox: &Inbox, context: &mut C) -> HandleReport {
        let mut total = HandleReport::default();
        loop {
            match inbox.recv() {
                Ok(delivery) => match self.handle_delivery(&delivery, context) {
                    Ok(report) => total.merge(report),
                    Err(err) => {
                        tracing::warn!(
                            destination = %delivery.destination,
                            error = %err,
                            "dropped malformed envelope"
                        );
                    }
                },
                Err(TransportError::Closed) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "inbox receive failed");
                    break;
                }
            }
        }
        total
    }

    fn reply(&self, request: &Envelope, reply: &Message) -> bool {
        let Some(address) = request.return_address else {
            tracing::warn!(
                correlation = %request.correlation_id,
                "reply produced but envelope has no return address"
            );
            return false;
        };

        let mut envelope = Envelope::new(request.correlation_id);
        if let Some(source) = &self.source {
            envelope = envelope.with_source(source.clone());
        }

        let sent = self
            .catalog
            .seal(envelope, std::slice::from_ref(reply))
            .and_then(|envelope| envelope.to_bytes(self.wire.max_payload_size))
            .map_err(crate::RpcError::from)
            .and_then(|bytes| {
                self.bus
                    .send(address, request.correlation_id, bytes)
                    .map_err(crate::RpcError::from)
            });

        match sent {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    correlation = %request.correlation_id,
                    address = %address,
                    error = %err,
                    "failed to deliver reply"
                );
                false
            }
        }
    }
}
