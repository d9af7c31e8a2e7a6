use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::address::{Address, CorrelationId};
use crate::error::{Result, TransportError};

/// One payload delivered by the bus.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Address the payload was sent to.
    pub destination: Address,
    /// Correlation id attached by the sender.
    pub correlation: CorrelationId,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

/// Pub/sub bus carrying opaque payloads between numeric addresses.
///
/// Delivery is at-most-once: a payload for which no receiver exists is
/// dropped without error.
pub trait Bus: Send + Sync {
    /// Send a payload to `destination`, tagged with `correlation`.
    fn send(&self, destination: Address, correlation: CorrelationId, payload: Bytes) -> Result<()>;

    /// Receive every payload sent to `address` that no subscription claims.
    fn bind(&self, address: Address) -> Result<Inbox>;

    /// Receive payloads sent to `address` carrying `correlation`.
    ///
    /// Subscriptions take precedence over a bound inbox for the same address.
    fn subscribe(&self, address: Address, correlation: CorrelationId) -> Result<Inbox>;

    /// Human-readable bus name for logging.
    fn name(&self) -> &'static str;
}

/// Receiving end of a binding or subscription.
///
/// Dropping the inbox releases the binding.
pub struct Inbox {
    receiver: Receiver<Delivery>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Inbox {
    /// Wrap a channel receiver with no release hook.
    pub fn new(receiver: Receiver<Delivery>) -> Self {
        Self {
            receiver,
            release: None,
        }
    }

    /// Run `release` when this inbox is dropped.
    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// Block until the next delivery arrives.
    pub fn recv(&self) -> Result<Delivery> {
        self.receiver.recv().map_err(|_| TransportError::Closed)
    }

    /// Block for at most `timeout` waiting for the next delivery.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Delivery> {
        self.receiver.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => TransportError::Timeout(timeout),
            RecvTimeoutError::Disconnected => TransportError::Closed,
        })
    }

    /// Return the next delivery if one is already queued.
    pub fn try_recv(&self) -> Option<Delivery> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Inbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox")
            .field("releasable", &self.release.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Routes {
    endpoints: HashMap<Address, Sender<Delivery>>,
    subscriptions: HashMap<(Address, CorrelationId), Sender<Delivery>>,
    shut_down: bool,
}

/// In-process bus backed by a mutex-protected routing table.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    routes: Arc<Mutex<Routes>>,
}

impl InMemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop routing. Subsequent sends fail with [`TransportError::Closed`]
    /// and every open inbox observes disconnection.
    pub fn shutdown(&self) {
        let mut routes = lock(&self.routes);
        routes.shut_down = true;
        routes.endpoints.clear();
        routes.subscriptions.clear();
    }

    /// Number of live bindings and subscriptions.
    pub fn route_count(&self) -> usize {
        let routes = lock(&self.routes);
        routes.endpoints.len() + routes.subscriptions.len()
    }
}

impl Bus for InMemoryBus {
    fn send(&self, destination: Address, correlation: CorrelationId, payload: Bytes) -> Result<()> {
        let mut routes = lock(&self.routes);
        if routes.shut_down {
            return Err(TransportError::Closed);
        }

        let delivery = Delivery {
            destination,
            correlation,
            payload,
        };

        let key = (destination, correlation);
        if let Some(sender) = routes.subscriptions.get(&key) {
            if sender.send(delivery).is_err() {
                routes.subscriptions.remove(&key);
                trace!(%destination, %correlation, "subscriber gone, payload dropped");
            }
            return Ok(());
        }

        match routes.endpoints.get(&destination) {
            Some(sender) => {
                if sender.send(delivery).is_err() {
                    routes.endpoints.remove(&destination);
                    trace!(%destination, %correlation, "endpoint gone, payload dropped");
                }
            }
            None => {
                trace!(%destination, %correlation, "no receiver, payload dropped");
            }
        }
        Ok(())
    }

    fn bind(&self, address: Address) -> Result<Inbox> {
        let mut routes = lock(&self.routes);
        if routes.shut_down {
            return Err(TransportError::Closed);
        }
        if routes.endpoints.contains_key(&address) {
            return Err(TransportError::AddressInUse(address));
        }

        let (tx, rx) = mpsc::channel();
        routes.endpoints.insert(address, tx);
        debug!(%address, "bound inbox");

        let weak = Arc::downgrade(&self.routes);
        Ok(Inbox::new(rx).with_release(move || {
            if let Some(routes) = weak.upgrade() {
                lock(&routes).endpoints.remove(&address);
            }
        }))
    }

    fn subscribe(&self, address: Address, correlation: CorrelationId) -> Result<Inbox> {
        let mut routes = lock(&self.routes);
        if routes.shut_down {
            return Err(TransportError::Closed);
        }

        let (tx, rx) = mpsc::channel();
        routes.subscriptions.insert((address, correlation), tx);

        let weak = Arc::downgrade(&self.routes);
        Ok(Inbox::new(rx).with_release(move || {
            if let Some(routes) = weak.upgrade() {
                lock(&routes).subscriptions.remove(&(address, correlation));
            }
        }))
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

fn lock(routes: &Mutex<Routes>) -> MutexGuard<'_, Routes> {
    routes.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIVER: Address = Address::new(1, 2, 9_000_000);
    const RESPONSE: Address = Address::new(3, 4, 9_000_001);

    #[test]
    fn bound_inbox_receives_payload() {
        let bus = InMemoryBus::new();
        let inbox = bus.bind(RECEIVER).unwrap();

        let corr = CorrelationId::next();
        bus.send(RECEIVER, corr, Bytes::from_static(b"hello")).unwrap();

        let delivery = inbox.recv().unwrap();
        assert_eq!(delivery.destination, RECEIVER);
        assert_eq!(delivery.correlation, corr);
        assert_eq!(delivery.payload.as_ref(), b"hello");
    }

    #[test]
    fn unroutable_payload_is_dropped_silently() {
        let bus = InMemoryBus::new();
        bus.send(RECEIVER, CorrelationId::next(), Bytes::from_static(b"x"))
            .unwrap();
    }

    #[test]
    fn double_bind_is_rejected() {
        let bus = InMemoryBus::new();
        let _inbox = bus.bind(RECEIVER).unwrap();
        let err = bus.bind(RECEIVER).unwrap_err();
        assert!(matches!(err, TransportError::AddressInUse(addr) if addr == RECEIVER));
    }

    #[test]
    fn subscription_takes_precedence_over_binding() {
        let bus = InMemoryBus::new();
        let endpoint = bus.bind(RESPONSE).unwrap();
        let corr = CorrelationId::next();
        let sub = bus.subscribe(RESPONSE, corr).unwrap();

        bus.send(RESPONSE, corr, Bytes::from_static(b"reply")).unwrap();
        bus.send(RESPONSE, CorrelationId::next(), Bytes::from_static(b"other"))
            .unwrap();

        assert_eq!(sub.recv().unwrap().payload.as_ref(), b"reply");
        assert!(sub.try_recv().is_none());
        assert_eq!(endpoint.recv().unwrap().payload.as_ref(), b"other");
    }

    #[test]
    fn request_to_receiver_is_not_captured_by_reply_subscription() {
        let bus = InMemoryBus::new();
        let server = bus.bind(RECEIVER).unwrap();
        let corr = CorrelationId::next();
        let client = bus.subscribe(RESPONSE, corr).unwrap();

        bus.send(RECEIVER, corr, Bytes::from_static(b"req")).unwrap();

        assert_eq!(server.recv().unwrap().payload.as_ref(), b"req");
        assert!(client.try_recv().is_none());
    }

    #[test]
    fn dropping_inbox_releases_route() {
        let bus = InMemoryBus::new();
        let inbox = bus.bind(RECEIVER).unwrap();
        let sub = bus.subscribe(RESPONSE, CorrelationId::next()).unwrap();
        assert_eq!(bus.route_count(), 2);

        drop(inbox);
        drop(sub);
        assert_eq!(bus.route_count(), 0);

        let _rebound = bus.bind(RECEIVER).unwrap();
    }

    #[test]
    fn recv_timeout_reports_timeout() {
        let bus = InMemoryBus::new();
        let inbox = bus.bind(RECEIVER).unwrap();
        let err = inbox.recv_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[test]
    fn shutdown_closes_inboxes_and_rejects_sends() {
        let bus = InMemoryBus::new();
        let inbox = bus.bind(RECEIVER).unwrap();
        bus.shutdown();

        assert!(matches!(inbox.recv(), Err(TransportError::Closed)));
        let err = bus
            .send(RECEIVER, CorrelationId::next(), Bytes::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn deliveries_cross_threads() {
        let bus = InMemoryBus::new();
        let inbox = bus.bind(RECEIVER).unwrap();
        let sender = bus.clone();

        let handle = std::thread::spawn(move || {
            for i in 0..3u8 {
                sender
                    .send(RECEIVER, CorrelationId::next(), Bytes::from(vec![i]))
                    .unwrap();
            }
        });
        handle.join().unwrap();

        let got: Vec<u8> = (0..3).map(|_| inbox.recv().unwrap().payload[0]).collect();
        assert_eq!(got, vec![0, 1, 2]);
    }
}
