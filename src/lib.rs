//! # NSM Client - Session Management for Audio Applications
//!
//! Client side of the Non Session Manager (NSM) protocol. An application
//! announces itself to a session server, is told by the server where to
//! open and when to save its project, and reports back whether it has
//! unsaved changes.
//!
//! ## Features
//!
//! - **Announce handshake**: capability exchange with independent connect
//!   and announce timeouts
//! - **Command routing**: server commands dispatched in delivery order to
//!   typed handlers, replies and error codes sent automatically
//! - **Dirty signal**: unsaved-changes notification gated on the declared
//!   capability
//! - **Pluggable transport**: OSC over UDP, or an in-process pair for
//!   simulating a server
//!
//! ## Protocol Overview
//!
//! ```text
//! Client                                    Session server
//!    |                                            |
//!    |---- /nsm/server/announce (caps) ---------->|
//!    |<--- /reply (announce, msg, name, caps) ----|
//!    |                                            |
//!    |<--- /nsm/client/open (path, name, id) -----|
//!    |---- /reply (open, "ok") ------------------>|
//!    |                                            |
//!    |---- /nsm/client/is_dirty ----------------->|
//!    |<--- /nsm/client/save ----------------------|
//!    |---- /error (save, -7, "...") ------------->|
//! ```
//!
//! ### State Machine
//!
//! ```text
//!  [Initializing] ──> [Connecting] ──> [Connected]
//!        │                  │               │
//!        └──────────────────┴───────────────┴──> [Error]
//! ```
//!
//! `Error` is terminal. After a successful connect the application polls
//! [`SessionClient::state`] and shuts down once it reads `Error`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nsm::{ClientBuilder, ClientCapability, HandlerResult, OpenRequest};
//!
//! let client = ClientBuilder::new("Looper")
//!     .with_capability(ClientCapability::Dirty)
//!     .on_open(|req: &OpenRequest| -> HandlerResult {
//!         std::fs::create_dir_all(&req.project_path)?;
//!         Ok(())
//!     })
//!     .on_save(|| -> HandlerResult { Ok(()) })
//!     .connect()
//!     .await?;
//!
//! println!("Managed by {}", client.server_name());
//! client.set_dirty(true).await;
//! ```
//!
//! ## Modules
//!
//! - [`client`]: Builder, handshake, command router and session client
//! - [`protocol`]: Capabilities, error codes and message shapes
//! - [`transport`]: Transport abstraction, UDP and in-memory backends
//! - [`config`]: Server address discovery and timeout settings
//! - [`error`]: Error types and result aliases

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use client::{
    ClientBuilder, ClientConfig, ClientState, HandlerError, HandlerResult, ServerInfo,
    SessionClient,
};
pub use config::{ClientSettings, ServerAddress};
pub use error::{NsmError, Result};
pub use protocol::{
    CapabilitySet, ClientCapability, ErrorCode, Message, OpenRequest, ProtocolError,
    ServerCapability,
};
pub use transport::{Connector, MemoryConnector, Transport, UdpConnector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
