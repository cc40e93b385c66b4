//! Session client.
//!
//! A [`SessionClient`] is one announced connection to a session server.
//! It is created by [`ClientBuilder::connect`] (or
//! [`SessionClient::connect`] with an explicit connector), after which a
//! background command router dispatches server commands to the
//! configured handlers. The application polls [`SessionClient::state`]
//! and stops once it reads [`ClientState::Error`].
//!
//! # Example
//!
//! ```rust,ignore
//! use nsm::client::{ClientBuilder, HandlerResult};
//! use nsm::protocol::{ClientCapability, OpenRequest};
//!
//! let client = ClientBuilder::new("Looper")
//!     .with_capability(ClientCapability::Dirty)
//!     .on_open(|req: &OpenRequest| -> HandlerResult { Ok(()) })
//!     .on_save(|| -> HandlerResult { Ok(()) })
//!     .connect()
//!     .await?;
//!
//! client.set_dirty(true).await;
//! ```

mod builder;
mod handlers;
mod handshake;
mod router;

pub use builder::{ClientBuilder, ClientConfig};
pub use handlers::{
    HandlerError, HandlerResult, OpenHandler, OptionalGuiHandler, SaveHandler,
    SessionLoadedHandler,
};
pub use handshake::ServerInfo;

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::config::{ClientSettings, ServerAddress};
use crate::error::{NsmError, Result};
use crate::protocol::{CapabilitySet, ClientCapability, Message, ServerCapability};
use crate::transport::{Connector, Transport};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Nothing opened yet
    Initializing,
    /// Transport opened, waiting for it to become ready
    Connecting,
    /// Announced (or announcing) to the server
    Connected,
    /// Failed; terminal
    Error,
}

impl ClientState {
    fn rank(self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Error => 3,
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// State written by the handshake and the router, read by the application
#[derive(Debug)]
pub(crate) struct ClientShared {
    pub(crate) state: ClientState,
    pub(crate) last_error: Option<NsmError>,
    pub(crate) server_name: String,
    pub(crate) server_message: String,
    pub(crate) server_capabilities: CapabilitySet<ServerCapability>,
}

impl ClientShared {
    pub(crate) fn new() -> Self {
        Self {
            state: ClientState::Initializing,
            last_error: None,
            server_name: String::new(),
            server_message: String::new(),
            server_capabilities: CapabilitySet::new(),
        }
    }

    /// Move forward to `next`. Backward moves and moves out of `Error`
    /// are ignored.
    pub(crate) fn advance(&mut self, next: ClientState) {
        if self.state != ClientState::Error && next.rank() > self.state.rank() {
            self.state = next;
        }
    }

    /// Enter `Error`, keeping the first failure recorded.
    pub(crate) fn fail(&mut self, err: NsmError) {
        self.state = ClientState::Error;
        if self.last_error.is_none() {
            self.last_error = Some(err);
        }
    }

    pub(crate) fn record_server(&mut self, info: ServerInfo) {
        self.server_name = info.name;
        self.server_message = info.message;
        self.server_capabilities = info.capabilities;
    }
}

/// Announced connection to a session server.
///
/// Dropping the client stops the command router and closes the transport.
pub struct SessionClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    shared: Arc<RwLock<ClientShared>>,
    router: JoinHandle<()>,
}

impl SessionClient {
    pub(crate) fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        shared: Arc<RwLock<ClientShared>>,
        router: JoinHandle<()>,
    ) -> Self {
        Self {
            config,
            transport,
            shared,
            router,
        }
    }

    /// Open a transport through `connector` and announce `config` to the
    /// server at `address`.
    ///
    /// Returns once the server accepted the announce. On any failure the
    /// transport is closed again.
    pub async fn connect(
        config: ClientConfig,
        settings: &ClientSettings,
        address: ServerAddress,
        connector: &dyn Connector,
    ) -> Result<Self> {
        handshake::perform(config, settings, address, connector).await
    }

    /// Record `err`, close the transport and hand the error back.
    pub(crate) fn fail(&self, err: NsmError) -> NsmError {
        self.shared.write().fail(err.clone());
        self.transport.close();
        err
    }

    /// Current state
    pub fn state(&self) -> ClientState {
        self.shared.read().state
    }

    /// Whether the client is connected and healthy
    pub fn is_connected(&self) -> bool {
        self.state() == ClientState::Connected
    }

    /// First failure recorded, if any
    pub fn last_error(&self) -> Option<NsmError> {
        self.shared.read().last_error.clone()
    }

    /// Server name from the announce reply
    pub fn server_name(&self) -> String {
        self.shared.read().server_name.clone()
    }

    /// Greeting from the announce reply
    pub fn server_message(&self) -> String {
        self.shared.read().server_message.clone()
    }

    /// Capabilities advertised by the server
    pub fn server_capabilities(&self) -> CapabilitySet<ServerCapability> {
        self.shared.read().server_capabilities.clone()
    }

    /// Whether the server advertised `cap`
    pub fn server_has_capability(&self, cap: &ServerCapability) -> bool {
        self.shared.read().server_capabilities.contains(cap)
    }

    /// Whether this client declared `cap`
    pub fn has_capability(&self, cap: ClientCapability) -> bool {
        self.config.capabilities.contains(&cap)
    }

    /// Capabilities declared by this client
    pub fn client_capabilities(&self) -> &CapabilitySet<ClientCapability> {
        &self.config.capabilities
    }

    /// Application name sent in the announce
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Tell the server whether there are unsaved changes.
    ///
    /// Does nothing unless the `dirty` capability was declared.
    pub async fn set_dirty(&self, dirty: bool) {
        self.notify(ClientCapability::Dirty, Message::dirty(dirty))
            .await;
    }

    /// Report progress of a long operation, clamped to 0.0 - 1.0.
    ///
    /// Does nothing unless the `progress` capability was declared.
    pub async fn report_progress(&self, value: f32) {
        self.notify(ClientCapability::Progress, Message::progress(value))
            .await;
    }

    /// Send a status message with priority 0 (lowest) to 3.
    ///
    /// Does nothing unless the `message` capability was declared.
    pub async fn send_message(&self, priority: i32, text: &str) {
        self.notify(ClientCapability::Message, Message::status(priority, text))
            .await;
    }

    /// Tell the server the optional GUI was shown or hidden.
    ///
    /// Does nothing unless the `optional-gui` capability was declared.
    pub async fn set_gui_visible(&self, visible: bool) {
        self.notify(ClientCapability::OptionalGui, Message::gui_visible(visible))
            .await;
    }

    /// Close the connection. The command router stops; the state is left
    /// as it is.
    pub fn close(&self) {
        tracing::debug!("Closing connection to session server");
        self.transport.close();
    }

    // Fire-and-forget: send failures are logged, never returned.
    async fn notify(&self, cap: ClientCapability, msg: Message) {
        if !self.has_capability(cap) {
            tracing::trace!("Not sending {}: capability {} not declared", msg.address, cap);
            return;
        }

        let address = msg.address.clone();
        if let Err(e) = self.transport.send(msg).await {
            tracing::warn!("Failed to send {}: {}", address, e);
        }
    }
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.read();
        f.debug_struct("SessionClient")
            .field("name", &self.config.name)
            .field("transport", &self.transport.name())
            .field("state", &shared.state)
            .field("server_name", &shared.server_name)
            .finish_non_exhaustive()
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.router.abort();
        self.transport.close();
    }
}
