//! Announce handshake.
//!
//! # State Machine
//!
//! ```text
//!                 open transport           transport ready
//!  [Initializing] ───────────────> [Connecting] ───────────────> [Connected]
//!        │                               │                             │
//!        └───────────────────────────────┴─────────────────────────────┴──> [Error]
//! ```
//!
//! Two independent bounds apply: `connect_timeout` for the transport to
//! report readiness, `announce_timeout` for the server to answer the
//! announce. Every failure after the transport was opened closes it, which
//! also ends the command router.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::timeout;

use super::router::CommandRouter;
use super::{ClientConfig, ClientShared, ClientState, SessionClient};
use crate::config::{ClientSettings, ServerAddress};
use crate::error::{NsmError, Result};
use crate::protocol::{CapabilitySet, Message, ProtocolError, ServerCapability};
use crate::transport::Connector;

/// What the server told us in its announce reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server name
    pub name: String,
    /// Greeting message
    pub message: String,
    /// Advertised server capabilities
    pub capabilities: CapabilitySet<ServerCapability>,
}

/// Resolution of the announce
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AnnounceOutcome {
    Accepted(ServerInfo),
    Rejected(ProtocolError),
    /// Connection lost before any reply arrived
    Lost(NsmError),
}

/// Single-resolution hand-off between the router and the handshake.
///
/// Resolved at most once; later resolutions are ignored. Reads after
/// resolution all see the same outcome.
#[derive(Debug)]
pub(crate) struct PendingAnnounce {
    slot: watch::Sender<Option<AnnounceOutcome>>,
}

impl PendingAnnounce {
    pub(crate) fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Store the outcome. Returns false if already resolved.
    pub(crate) fn resolve(&self, outcome: AnnounceOutcome) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    /// Current outcome without waiting
    pub(crate) fn outcome(&self) -> Option<AnnounceOutcome> {
        self.slot.borrow().clone()
    }

    /// Wait until resolved
    pub(crate) async fn wait(&self) -> AnnounceOutcome {
        let mut rx = self.slot.subscribe();
        let resolved = rx.wait_for(Option::is_some).await.ok().and_then(|v| v.clone());
        // `slot` outlives every receiver subscribed here.
        resolved.unwrap_or_else(|| {
            AnnounceOutcome::Lost(NsmError::Transport("announce hand-off dropped".to_string()))
        })
    }
}

/// Open the transport, start the router, announce and wait for the reply.
pub(crate) async fn perform(
    config: ClientConfig,
    settings: &ClientSettings,
    address: ServerAddress,
    connector: &dyn Connector,
) -> Result<SessionClient> {
    let config = Arc::new(config);
    let shared = Arc::new(RwLock::new(ClientShared::new()));

    tracing::debug!("Connecting to session server at {}", address.url());
    let transport = connector.open(address.clone()).await.map_err(|e| match e {
        NsmError::Connection(_) => e,
        other => NsmError::Connection(other.to_string()),
    })?;

    shared.write().advance(ClientState::Connecting);

    let pending = Arc::new(PendingAnnounce::new());
    let router = CommandRouter::new(
        Arc::clone(&config),
        Arc::clone(&transport),
        Arc::clone(&shared),
        Arc::clone(&pending),
    );
    let router = tokio::spawn(router.run());

    // Dropping the client on any early return closes the transport and
    // stops the router.
    let client = SessionClient::new(config, transport, shared, router);

    let poll_interval = settings.poll_interval();
    let ready = timeout(settings.connect_timeout(), async {
        while !client.transport.is_connected() {
            tokio::time::sleep(poll_interval).await;
        }
    })
    .await;
    if ready.is_err() {
        let err = NsmError::ConnectionTimeout(settings.connect_timeout_ms);
        tracing::warn!("{} ({})", err, address);
        return Err(client.fail(err));
    }

    client.shared.write().advance(ClientState::Connected);

    let announce = Message::announce(
        &client.config.name,
        &client.config.capabilities.encode(),
        &client.config.executable,
        std::process::id() as i32,
    );
    tracing::debug!(
        "Announcing {} with capabilities {}",
        client.config.name,
        client.config.capabilities.encode()
    );
    if let Err(e) = client.transport.send(announce).await {
        return Err(client.fail(NsmError::Connection(format!("error sending announce: {e}"))));
    }

    match timeout(settings.announce_timeout(), pending.wait()).await {
        Ok(AnnounceOutcome::Accepted(info)) => {
            tracing::info!(
                "Connected to session server '{}' ({}), capabilities {}",
                info.name,
                info.message,
                info.capabilities.encode()
            );
            client.shared.write().record_server(info);
            Ok(client)
        },
        Ok(AnnounceOutcome::Rejected(err)) => {
            tracing::warn!("Server rejected announce: {}", err);
            let message = if err.message.is_empty() {
                err.code.description().to_string()
            } else {
                err.message
            };
            Err(client.fail(NsmError::HandshakeRejected {
                code: err.code,
                message,
            }))
        },
        Ok(AnnounceOutcome::Lost(err)) => Err(client.fail(match err {
            NsmError::Transport(reason) => NsmError::Connection(reason),
            other => other,
        })),
        Err(_) => {
            let err = NsmError::HandshakeTimeout(settings.announce_timeout_ms);
            tracing::warn!("{}", err);
            Err(client.fail(err))
        },
    }
}
