//! Transport layer abstraction for the NSM client.
//!
//! The session client never touches sockets directly. It talks to a
//! [`Transport`] (one open connection to the session server) obtained from a
//! [`Connector`]. Two backends are provided:
//! - **UDP/OSC**: the real NSM wire, OSC packets over UDP encoded by `rosc`
//! - **Memory**: an in-process pair where the other end is a [`MemoryPeer`],
//!   used to simulate a session server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   SessionClient / CommandRouter         │
//! │         (Transport-Agnostic)            │
//! └──────────────────┬──────────────────────┘
//!                    │
//!          ┌────────┴────────┐
//!          ▼                 ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │  UdpTransport   │ │ MemoryTransport │
//! │   (OSC/UDP)     │ │  (in-process)   │
//! └─────────────────┘ └─────────────────┘
//! ```

mod memory;
mod udp;

pub use memory::{MemoryConnector, MemoryPeer, MemoryTransport};
pub use udp::{UdpConnector, UdpTransport};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::ServerAddress;
use crate::error::Result;
use crate::protocol::Message;

/// Boxed future returned by transport operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One open connection to a session server.
///
/// `send` and `recv` both take `&self`: the command router receives on a
/// background task while the foreground sends announce and notifications.
pub trait Transport: Send + Sync {
    /// Send a message to the server.
    fn send(&self, msg: Message) -> BoxFuture<'_, Result<()>>;

    /// Wait for the next inbound message.
    ///
    /// Returns `Ok(None)` once [`close`](Transport::close) has been called.
    /// An `Err` means the connection is lost and no further messages will
    /// arrive.
    fn recv(&self) -> BoxFuture<'_, Result<Option<Message>>>;

    /// Whether the transport is ready to exchange messages.
    fn is_connected(&self) -> bool;

    /// Close the connection. Pending and future `recv` calls return
    /// `Ok(None)`. Idempotent.
    fn close(&self);

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}

/// Opens transports to a server address.
pub trait Connector: Send + Sync {
    /// Open a connection.
    fn open(&self, address: ServerAddress) -> BoxFuture<'_, Result<Arc<dyn Transport>>>;
}
