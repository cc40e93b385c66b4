//! In-process transport.
//!
//! [`MemoryTransport::pair`] returns the client end and a [`MemoryPeer`]
//! that plays the session server: it sees every message the client sends
//! and can deliver commands, replies, or a fatal connection loss.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};

use super::{BoxFuture, Connector, Transport};
use crate::config::ServerAddress;
use crate::error::{NsmError, Result};
use crate::protocol::{ErrorCode, Message, ERROR, REPLY, SERVER_ANNOUNCE};

enum PeerEvent {
    Deliver(Message),
    Fail(String),
}

/// State shared by both ends
#[derive(Debug, Default)]
struct Shared {
    closed: AtomicBool,
    ready: AtomicBool,
}

/// Client end of an in-process connection.
pub struct MemoryTransport {
    inbound: TokioMutex<mpsc::UnboundedReceiver<PeerEvent>>,
    outbound: mpsc::UnboundedSender<Message>,
    shutdown: watch::Sender<bool>,
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Create a connected client end and its peer.
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            ready: AtomicBool::new(true),
        });

        let transport = MemoryTransport {
            inbound: TokioMutex::new(inbound),
            outbound,
            shutdown,
            shared: Arc::clone(&shared),
        };
        let peer = MemoryPeer {
            to_client,
            from_client: TokioMutex::new(from_client),
            shared,
        };
        (transport, peer)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, msg: Message) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(NsmError::Connection("transport closed".to_string()));
            }
            self.outbound
                .send(msg)
                .map_err(|_| NsmError::Connection("peer hung up".to_string()))
        })
    }

    fn recv(&self) -> BoxFuture<'_, Result<Option<Message>>> {
        Box::pin(async move {
            let mut shutdown = self.shutdown.subscribe();
            if *shutdown.borrow_and_update() {
                return Ok(None);
            }

            let mut inbound = self.inbound.lock().await;
            tokio::select! {
                _ = shutdown.changed() => Ok(None),
                event = inbound.recv() => match event {
                    Some(PeerEvent::Deliver(msg)) => Ok(Some(msg)),
                    Some(PeerEvent::Fail(reason)) => Err(NsmError::Transport(reason)),
                    None => Err(NsmError::Transport("peer hung up".to_string())),
                },
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire) && !self.shared.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shutdown.send_replace(true);
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Server end of an in-process connection.
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<PeerEvent>,
    from_client: TokioMutex<mpsc::UnboundedReceiver<Message>>,
    shared: Arc<Shared>,
}

impl MemoryPeer {
    /// Deliver a message to the client.
    pub fn send(&self, msg: Message) {
        // Client end may already be dropped.
        let _ = self.to_client.send(PeerEvent::Deliver(msg));
    }

    /// Make the client's next `recv` fail as if the connection was lost.
    pub fn fail(&self, reason: &str) {
        let _ = self.to_client.send(PeerEvent::Fail(reason.to_string()));
    }

    /// Next message sent by the client, `None` when the client end is dropped.
    pub async fn recv(&self) -> Option<Message> {
        self.from_client.lock().await.recv().await
    }

    /// Next message sent by the client, waiting at most `wait`.
    pub async fn recv_timeout(&self, wait: Duration) -> Option<Message> {
        tokio::time::timeout(wait, self.recv()).await.ok().flatten()
    }

    /// Message already sent by the client, without waiting.
    pub async fn try_recv(&self) -> Option<Message> {
        self.from_client.lock().await.try_recv().ok()
    }

    /// Whether the client closed its end.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Control whether the client end reports itself connected.
    pub fn set_ready(&self, ready: bool) {
        self.shared.ready.store(ready, Ordering::Release);
    }

    /// Reply to the announce with success.
    pub fn accept_announce(&self, server_name: &str, capabilities: &str) {
        self.send(
            Message::new(REPLY)
                .arg(SERVER_ANNOUNCE)
                .arg("Howdy, what took you so long?")
                .arg(server_name)
                .arg(capabilities),
        );
    }

    /// Reply to the announce with an error.
    pub fn reject_announce(&self, code: ErrorCode, message: &str) {
        self.send(
            Message::new(ERROR)
                .arg(SERVER_ANNOUNCE)
                .arg(code.code())
                .arg(message),
        );
    }
}

/// Single-use connector handing out one [`MemoryTransport`].
pub struct MemoryConnector {
    transport: Mutex<Option<MemoryTransport>>,
    failure: Option<String>,
    opens: AtomicUsize,
}

impl MemoryConnector {
    /// Create a connector and the peer of the transport it will hand out.
    pub fn pair() -> (Self, MemoryPeer) {
        let (transport, peer) = MemoryTransport::pair();
        let connector = Self {
            transport: Mutex::new(Some(transport)),
            failure: None,
            opens: AtomicUsize::new(0),
        };
        (connector, peer)
    }

    /// Connector whose `open` always fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self {
            transport: Mutex::new(None),
            failure: Some(reason.to_string()),
            opens: AtomicUsize::new(0),
        }
    }

    /// Number of `open` calls made so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Acquire)
    }
}

impl Connector for MemoryConnector {
    fn open(&self, address: ServerAddress) -> BoxFuture<'_, Result<Arc<dyn Transport>>> {
        Box::pin(async move {
            self.opens.fetch_add(1, Ordering::AcqRel);
            if let Some(reason) = &self.failure {
                return Err(NsmError::Connection(reason.clone()));
            }

            tracing::debug!("Opening in-memory transport for {}", address);
            self.transport
                .lock()
                .take()
                .map(|transport| Arc::new(transport) as Arc<dyn Transport>)
                .ok_or_else(|| NsmError::Connection("memory transport already taken".to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_flow_both_ways() {
        let (transport, peer) = MemoryTransport::pair();

        transport.send(Message::new("/ping")).await.unwrap();
        assert_eq!(peer.recv().await, Some(Message::new("/ping")));

        peer.send(Message::new("/pong"));
        assert_eq!(transport.recv().await, Ok(Some(Message::new("/pong"))));
    }

    #[tokio::test]
    async fn test_fail_surfaces_as_transport_error() {
        let (transport, peer) = MemoryTransport::pair();
        peer.fail("cable unplugged");
        assert_eq!(
            transport.recv().await,
            Err(NsmError::Transport("cable unplugged".to_string()))
        );
    }

    #[tokio::test]
    async fn test_close_ends_recv_and_send() {
        let (transport, peer) = MemoryTransport::pair();
        transport.close();

        assert!(peer.is_closed());
        assert!(!transport.is_connected());
        assert_eq!(transport.recv().await, Ok(None));
        assert!(transport.send(Message::new("/late")).await.is_err());
    }

    #[tokio::test]
    async fn test_connector_is_single_use() {
        let (connector, _peer) = MemoryConnector::pair();
        let address = ServerAddress::parse("osc.udp://localhost:15000/").unwrap();

        assert!(connector.open(address.clone()).await.is_ok());
        assert!(connector.open(address).await.is_err());
        assert_eq!(connector.open_count(), 2);
    }
}
