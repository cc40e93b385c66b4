//! End-to-end command routing tests.
//!
//! Each test connects a client to a simulated server over the in-memory
//! transport, then drives it with server commands.

use std::sync::Arc;
use std::time::Duration;

use nsm::client::{ClientBuilder, ClientState, HandlerError, HandlerResult, SessionClient};
use nsm::config::{ClientSettings, ServerAddress};
use nsm::error::NsmError;
use nsm::protocol::{
    Arg, ClientCapability, ErrorCode, Message, OpenRequest, ProtocolError, CLIENT_HIDE_GUI,
    CLIENT_IS_CLEAN, CLIENT_IS_DIRTY, CLIENT_OPEN, CLIENT_PROGRESS, CLIENT_SAVE,
    CLIENT_SESSION_LOADED, CLIENT_SHOW_GUI, ERROR,
};
use nsm::transport::{MemoryConnector, MemoryPeer};
use parking_lot::Mutex;

const WAIT: Duration = Duration::from_secs(2);

type Events = Arc<Mutex<Vec<String>>>;

async fn connect(builder: ClientBuilder) -> (SessionClient, MemoryPeer) {
    let (connector, peer) = MemoryConnector::pair();
    let server = tokio::spawn(async move {
        peer.recv().await.expect("no announce");
        peer.accept_announce("nsmd", ":server_control:");
        peer
    });

    let address = ServerAddress::parse("osc.udp://localhost:15432/").unwrap();
    let settings = ClientSettings::default().with_timeouts(WAIT, WAIT);
    let client = builder
        .connect_with(address, &settings, &connector)
        .await
        .unwrap();
    (client, server.await.unwrap())
}

fn recording(events: &Events) -> ClientBuilder {
    let on_open = {
        let events = Arc::clone(events);
        move |req: &OpenRequest| -> HandlerResult {
            events.lock().push(format!("open {} {}", req.project_path, req.client_id));
            Ok(())
        }
    };
    let on_save = {
        let events = Arc::clone(events);
        move || -> HandlerResult {
            events.lock().push("save".to_string());
            Ok(())
        }
    };
    let on_loaded = {
        let events = Arc::clone(events);
        move || events.lock().push("loaded".to_string())
    };

    ClientBuilder::new("Test Client")
        .on_open(on_open)
        .on_save(on_save)
        .on_session_loaded(on_loaded)
}

fn open(path: &str, name: &str, client_id: &str) -> Message {
    Message::new(CLIENT_OPEN).arg(path).arg(name).arg(client_id)
}

/// Open handler success is acknowledged with `/reply (open, "ok")`
#[tokio::test]
async fn test_open_replies_ok() {
    let events = Events::default();
    let (client, peer) = connect(recording(&events)).await;

    peer.send(open("/sessions/demo/Test", "Test", "nTEST"));
    let reply = peer.recv_timeout(WAIT).await.unwrap();

    assert_eq!(reply, Message::reply_ok(CLIENT_OPEN));
    assert_eq!(*events.lock(), vec!["open /sessions/demo/Test nTEST"]);
    assert_eq!(client.state(), ClientState::Connected);
}

/// Typed save failure goes on the wire with its code; the client stays up
#[tokio::test]
async fn test_save_failure_reports_code() {
    let builder = ClientBuilder::new("Test Client")
        .on_open(|_: &OpenRequest| -> HandlerResult { Ok(()) })
        .on_save(|| -> HandlerResult {
            Err(ProtocolError::new(ErrorCode::UnsavedChanges, "unsaved").into())
        });
    let (client, peer) = connect(builder).await;

    peer.send(Message::new(CLIENT_SAVE));
    let reply = peer.recv_timeout(WAIT).await.unwrap();

    assert_eq!(reply.address, ERROR);
    assert_eq!(
        reply.args,
        vec![Arg::from(CLIENT_SAVE), Arg::Int(-7), Arg::from("unsaved")]
    );
    assert_eq!(client.state(), ClientState::Connected);
    assert_eq!(client.last_error(), None);
}

/// Untyped open failure is reported with the general code
#[tokio::test]
async fn test_open_failure_reports_general_code() {
    let builder = ClientBuilder::new("Test Client")
        .on_open(|_: &OpenRequest| -> HandlerResult {
            Err(HandlerError::generic("permission denied"))
        })
        .on_save(|| -> HandlerResult { Ok(()) });
    let (_client, peer) = connect(builder).await;

    peer.send(open("/ro/Test", "Test", "nTEST"));
    let reply = peer.recv_timeout(WAIT).await.unwrap();

    assert_eq!(
        reply,
        Message::error(CLIENT_OPEN, ErrorCode::General, "permission denied")
    );
}

/// Commands are handled in the order they were delivered
#[tokio::test]
async fn test_dispatch_order_matches_delivery_order() {
    let events = Events::default();
    let (_client, peer) = connect(recording(&events)).await;

    peer.send(open("/s/A", "A", "nA"));
    peer.send(Message::new(CLIENT_SAVE));
    peer.send(Message::new(CLIENT_SESSION_LOADED));
    peer.send(open("/s/B", "B", "nB"));
    peer.send(Message::new(CLIENT_SAVE));

    let mut replies = Vec::new();
    for _ in 0..4 {
        replies.push(peer.recv_timeout(WAIT).await.unwrap().args[0].clone());
    }

    assert_eq!(
        replies,
        vec![
            Arg::from(CLIENT_OPEN),
            Arg::from(CLIENT_SAVE),
            Arg::from(CLIENT_OPEN),
            Arg::from(CLIENT_SAVE),
        ]
    );
    assert_eq!(
        *events.lock(),
        vec!["open /s/A nA", "save", "loaded", "open /s/B nB", "save"]
    );
}

/// Malformed commands are dropped without a reply
#[tokio::test]
async fn test_malformed_commands_are_dropped() {
    let events = Events::default();
    let (client, peer) = connect(recording(&events)).await;

    peer.send(Message::new(CLIENT_OPEN).arg("/only/path"));
    peer.send(Message::new(CLIENT_SAVE).arg(1));
    peer.send(Message::new("/nsm/client/unheard_of"));
    peer.send(Message::new(CLIENT_SAVE));

    let reply = peer.recv_timeout(WAIT).await.unwrap();
    assert_eq!(reply, Message::reply_ok(CLIENT_SAVE));
    assert_eq!(*events.lock(), vec!["save"]);
    assert_eq!(client.state(), ClientState::Connected);
}

/// Show/hide reach the GUI handler
#[tokio::test]
async fn test_optional_gui_commands() {
    let shown = Arc::new(Mutex::new(Vec::new()));
    let builder = {
        let shown = Arc::clone(&shown);
        ClientBuilder::new("Test Client")
            .with_capability(ClientCapability::OptionalGui)
            .on_open(|_: &OpenRequest| -> HandlerResult { Ok(()) })
            .on_save(|| -> HandlerResult { Ok(()) })
            .on_optional_gui(move |visible: bool| shown.lock().push(visible))
    };
    let (client, peer) = connect(builder).await;

    peer.send(Message::new(CLIENT_SHOW_GUI));
    peer.send(Message::new(CLIENT_HIDE_GUI));
    peer.send(Message::new(CLIENT_SAVE));
    peer.recv_timeout(WAIT).await.unwrap();
    assert_eq!(*shown.lock(), vec![true, false]);

    client.set_gui_visible(true).await;
    assert_eq!(
        peer.recv_timeout(WAIT).await,
        Some(Message::new("/nsm/client/gui_is_shown"))
    );
}

/// Without the dirty capability nothing goes on the wire
#[tokio::test]
async fn test_set_dirty_without_capability() {
    let events = Events::default();
    let (client, peer) = connect(recording(&events)).await;

    client.set_dirty(true).await;
    client.set_dirty(false).await;

    assert_eq!(peer.try_recv().await, None);
}

/// With the dirty capability both notifications are sent without arguments
#[tokio::test]
async fn test_set_dirty_with_capability() {
    let events = Events::default();
    let (client, peer) = connect(recording(&events).with_capability(ClientCapability::Dirty)).await;

    client.set_dirty(true).await;
    client.set_dirty(false).await;

    assert_eq!(peer.try_recv().await, Some(Message::new(CLIENT_IS_DIRTY)));
    assert_eq!(peer.try_recv().await, Some(Message::new(CLIENT_IS_CLEAN)));
}

/// Progress and status messages are gated on their capabilities
#[tokio::test]
async fn test_progress_and_message_gating() {
    let events = Events::default();
    let (client, peer) =
        connect(recording(&events).with_capability(ClientCapability::Progress)).await;

    client.report_progress(1.5).await;
    client.send_message(2, "not declared").await;

    assert_eq!(
        peer.try_recv().await,
        Some(Message::new(CLIENT_PROGRESS).arg(1.0_f32))
    );
    assert_eq!(peer.try_recv().await, None);
}

/// Sending after the connection is gone is logged, never returned
#[tokio::test]
async fn test_set_dirty_after_close_is_silent() {
    let events = Events::default();
    let (client, peer) = connect(recording(&events).with_capability(ClientCapability::Dirty)).await;

    client.close();
    client.set_dirty(true).await;

    assert!(peer.is_closed());
    assert_eq!(peer.try_recv().await, None);
    assert_eq!(client.state(), ClientState::Connected);
}

/// Losing the connection moves the client to the terminal error state
#[tokio::test]
async fn test_connection_loss_sets_error_state() {
    let events = Events::default();
    let (client, peer) = connect(recording(&events)).await;

    peer.fail("link down");

    tokio::time::timeout(WAIT, async {
        while client.state() != ClientState::Error {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client never entered the error state");

    assert_eq!(
        client.last_error(),
        Some(NsmError::Transport("link down".to_string()))
    );
    assert!(peer.is_closed());
}

/// Error replies for other requests do not disturb the client
#[tokio::test]
async fn test_error_for_other_request_is_ignored() {
    let events = Events::default();
    let (client, peer) = connect(recording(&events)).await;

    peer.send(
        Message::new(ERROR)
            .arg("/nsm/server/save")
            .arg(ErrorCode::NotNow.code())
            .arg("busy"),
    );
    peer.send(Message::new(CLIENT_SAVE));
    peer.recv_timeout(WAIT).await.unwrap();

    assert_eq!(client.state(), ClientState::Connected);
    assert_eq!(client.last_error(), None);
}

/// A panicking handler is answered with a general error and the client
/// keeps serving later commands
#[tokio::test]
async fn test_handler_panic_keeps_router_alive() {
    let builder = ClientBuilder::new("Test Client")
        .on_open(|_: &OpenRequest| -> HandlerResult { panic!("bug in open") })
        .on_save(|| -> HandlerResult { Ok(()) });
    let (client, peer) = connect(builder).await;

    peer.send(open("/s/Test", "Test", "nTEST"));
    peer.send(Message::new(CLIENT_SAVE));

    assert_eq!(
        peer.recv_timeout(WAIT).await,
        Some(Message::error(
            CLIENT_OPEN,
            ErrorCode::General,
            "open handler panicked: bug in open"
        ))
    );
    assert_eq!(
        peer.recv_timeout(WAIT).await,
        Some(Message::reply_ok(CLIENT_SAVE))
    );
    assert_eq!(client.state(), ClientState::Connected);
    assert_eq!(client.last_error(), None);
}
