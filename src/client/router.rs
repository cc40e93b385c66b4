//! Command router: the background receive loop.
//!
//! Receives every inbound message for the life of the connection, decodes
//! it against its address signature and invokes the matching handler on
//! this task, in delivery order. Messages that fail to decode are dropped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use super::handlers::{HandlerError, HandlerResult};
use super::handshake::{AnnounceOutcome, PendingAnnounce, ServerInfo};
use super::{ClientConfig, ClientShared};
use crate::protocol::{
    CapabilitySet, ErrorCode, Inbound, Message, ProtocolError, CLIENT_OPEN, CLIENT_SAVE,
    SERVER_ANNOUNCE,
};
use crate::transport::Transport;

pub(crate) struct CommandRouter {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    shared: Arc<RwLock<ClientShared>>,
    pending: Arc<PendingAnnounce>,
}

impl CommandRouter {
    pub(crate) fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        shared: Arc<RwLock<ClientShared>>,
        pending: Arc<PendingAnnounce>,
    ) -> Self {
        Self {
            config,
            transport,
            shared,
            pending,
        }
    }

    /// Run until the transport is closed or fails.
    pub(crate) async fn run(self) {
        tracing::debug!("Command router started on {} transport", self.transport.name());

        loop {
            match self.transport.recv().await {
                Ok(Some(msg)) => {
                    if let Some(reply) = self.dispatch(&msg) {
                        if let Err(e) = self.transport.send(reply).await {
                            tracing::warn!("Failed to send reply to {}: {}", msg.address, e);
                        }
                    }
                },
                Ok(None) => {
                    tracing::debug!("Transport closed, command router stopping");
                    break;
                },
                Err(err) => {
                    tracing::error!("Connection to session server lost: {}", err);
                    self.transport.close();
                    self.pending.resolve(AnnounceOutcome::Lost(err.clone()));
                    self.shared.write().fail(err);
                    break;
                },
            }
        }
    }

    /// Handle one message, returning the reply to send, if any.
    fn dispatch(&self, msg: &Message) -> Option<Message> {
        let inbound = match Inbound::decode(msg) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::trace!("Dropping message: {}", e);
                return None;
            },
        };

        match inbound {
            Inbound::AnnounceReply {
                message,
                server_name,
                capabilities,
            } => {
                let info = ServerInfo {
                    name: server_name,
                    message,
                    capabilities: CapabilitySet::decode(&capabilities),
                };
                if !self.pending.resolve(AnnounceOutcome::Accepted(info)) {
                    tracing::debug!("Ignoring repeated announce reply");
                }
                None
            },
            Inbound::Error {
                address,
                code,
                message,
            } => {
                tracing::debug!(
                    "/error for {}: {} ({}, {})",
                    address,
                    message,
                    code,
                    code.description()
                );
                if address == SERVER_ANNOUNCE {
                    self.pending
                        .resolve(AnnounceOutcome::Rejected(ProtocolError::new(code, message)));
                }
                None
            },
            Inbound::Reply { address } => {
                tracing::debug!("/reply for {}", address);
                None
            },
            Inbound::Open(request) => {
                tracing::info!(
                    "Open requested: {} ({}) as {}",
                    request.project_path,
                    request.display_name,
                    request.client_id
                );
                Some(match guarded("open", || self.config.open.open(&request)) {
                    Ok(()) => Message::reply_ok(CLIENT_OPEN),
                    Err(err) => {
                        tracing::warn!("Open handler failed: {}", err);
                        Message::error(CLIENT_OPEN, ErrorCode::General, err.message())
                    },
                })
            },
            Inbound::Save => {
                tracing::info!("Save requested");
                Some(match guarded("save", || self.config.save.save()) {
                    Ok(()) => Message::reply_ok(CLIENT_SAVE),
                    Err(err) => {
                        tracing::warn!("Save handler failed: {}", err);
                        Message::error(CLIENT_SAVE, err.code(), err.message())
                    },
                })
            },
            Inbound::SessionLoaded => {
                if let Some(handler) = &self.config.session_loaded {
                    if let Err(err) = guarded("session loaded", || {
                        handler.session_loaded();
                        Ok(())
                    }) {
                        tracing::error!("{}", err);
                    }
                }
                None
            },
            Inbound::ShowOptionalGui => {
                self.set_gui_visible(true);
                None
            },
            Inbound::HideOptionalGui => {
                self.set_gui_visible(false);
                None
            },
        }
    }

    fn set_gui_visible(&self, visible: bool) {
        if let Some(handler) = &self.config.optional_gui {
            if let Err(err) = guarded("optional gui", || {
                handler.set_visible(visible);
                Ok(())
            }) {
                tracing::error!("{}", err);
            }
        }
    }
}

/// Run a handler, turning a panic into a generic handler failure so the
/// router keeps serving the connection.
fn guarded(name: &str, handler: impl FnOnce() -> HandlerResult) -> HandlerResult {
    panic::catch_unwind(AssertUnwindSafe(handler)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(HandlerError::generic(format!("{name} handler panicked: {reason}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientBuilder, ClientState};
    use crate::protocol::{Arg, OpenRequest, ERROR, REPLY};
    use crate::transport::MemoryTransport;

    fn router(builder: ClientBuilder) -> CommandRouter {
        let (transport, _peer) = MemoryTransport::pair();
        CommandRouter::new(
            Arc::new(builder.build().unwrap()),
            Arc::new(transport),
            Arc::new(RwLock::new(ClientShared::new())),
            Arc::new(PendingAnnounce::new()),
        )
    }

    fn builder() -> ClientBuilder {
        ClientBuilder::new("Test")
            .on_open(|_: &OpenRequest| -> HandlerResult { Ok(()) })
            .on_save(|| -> HandlerResult { Ok(()) })
    }

    #[test]
    fn test_open_failure_always_uses_general_code() {
        let router = router(
            ClientBuilder::new("Test")
                .on_save(|| -> HandlerResult { Ok(()) })
                .on_open(|_: &OpenRequest| -> HandlerResult {
                    Err(ProtocolError::new(ErrorCode::BadProject, "corrupt").into())
                }),
        );

        let msg = Message::new(CLIENT_OPEN).arg("/p").arg("P").arg("nP");
        let reply = router.dispatch(&msg).unwrap();
        assert_eq!(reply.address, ERROR);
        assert_eq!(
            reply.args,
            vec![Arg::from(CLIENT_OPEN), Arg::Int(-1), Arg::from("corrupt")]
        );
    }

    #[test]
    fn test_save_generic_failure() {
        let router = router(
            ClientBuilder::new("Test")
                .on_open(|_: &OpenRequest| -> HandlerResult { Ok(()) })
                .on_save(|| -> HandlerResult { Err(HandlerError::generic("disk full")) }),
        );

        let reply = router.dispatch(&Message::new(CLIENT_SAVE)).unwrap();
        assert_eq!(
            reply.args,
            vec![Arg::from(CLIENT_SAVE), Arg::Int(-1), Arg::from("disk full")]
        );
    }

    #[test]
    fn test_panicking_save_becomes_general_error() {
        let router = router(
            ClientBuilder::new("Test")
                .on_open(|_: &OpenRequest| -> HandlerResult { Ok(()) })
                .on_save(|| -> HandlerResult { panic!("disk driver bug") }),
        );

        let reply = router.dispatch(&Message::new(CLIENT_SAVE)).unwrap();
        assert_eq!(
            reply,
            Message::error(
                CLIENT_SAVE,
                ErrorCode::General,
                "save handler panicked: disk driver bug"
            )
        );
    }

    #[test]
    fn test_panicking_gui_handler_is_contained() {
        let router = router(
            builder()
                .with_capability(crate::protocol::ClientCapability::OptionalGui)
                .on_optional_gui(|_visible: bool| panic!("no display")),
        );

        assert!(router.dispatch(&Message::new(crate::protocol::CLIENT_SHOW_GUI)).is_none());
        assert!(router.dispatch(&Message::new(CLIENT_SAVE)).is_some());
    }

    #[test]
    fn test_announce_reply_resolves_pending() {
        let router = router(builder());
        let msg = Message::new(REPLY)
            .arg(SERVER_ANNOUNCE)
            .arg("hello")
            .arg("nsmd")
            .arg("server_control:optional-gui");

        assert!(router.dispatch(&msg).is_none());
        match router.pending.outcome() {
            Some(AnnounceOutcome::Accepted(info)) => {
                assert_eq!(info.name, "nsmd");
                assert!(info
                    .capabilities
                    .contains(&crate::protocol::ServerCapability::OptionalGui));
            },
            other => panic!("unexpected {other:?}"),
        }
        // Recording happens in the handshake, not here.
        assert!(router.shared.read().server_capabilities.is_empty());
    }

    #[test]
    fn test_error_for_other_address_is_only_logged() {
        let router = router(builder());
        let msg = Message::new(ERROR).arg("/nsm/server/save").arg(-8).arg("later");

        assert!(router.dispatch(&msg).is_none());
        assert_eq!(router.pending.outcome(), None);
    }

    #[test]
    fn test_malformed_messages_are_dropped() {
        let router = router(builder());

        assert!(router
            .dispatch(&Message::new(CLIENT_OPEN).arg("/only-one"))
            .is_none());
        assert!(router.dispatch(&Message::new("/nsm/client/unknown")).is_none());
        assert_eq!(router.shared.read().state, ClientState::Initializing);
    }
}
