//! NSM protocol vocabulary: addresses, capabilities, error codes, messages.
//!
//! # Message Flow
//!
//! ```text
//! Client                                   Server
//!    |                                        |
//!    |-- /nsm/server/announce (caps) ------->|  Announce with capabilities
//!    |                                        |
//!    |<- /reply (announce, name, caps) ------|  Handshake complete
//!    |   or /error (announce, code, msg)     |  or rejected with code
//!    |                                        |
//!    |<- /nsm/client/open (path, name, id) --|  Lifecycle commands
//!    |-- /reply (open, "ok") --------------->|
//!    |<- /nsm/client/save -------------------|
//!    |-- /error (save, -7, msg) ------------>|
//!    |                                        |
//!    |-- /nsm/client/is_dirty -------------->|  Fire-and-forget notifications
//! ```
//!
//! ## Error Codes
//!
//! | Code | Meaning                  |
//! |------|--------------------------|
//! | -1   | General                  |
//! | -2   | Incompatible API         |
//! | -3   | Blacklisted              |
//! | -4   | Launch failed            |
//! | -5   | No such file             |
//! | -6   | No session open          |
//! | -7   | Unsaved changes          |
//! | -8   | Not now                  |
//! | -9   | Bad project              |
//! | -10  | Create failed            |

mod capabilities;
mod codes;
mod message;

pub use capabilities::{Capability, CapabilitySet, ClientCapability, ServerCapability};
pub use codes::{ErrorCode, ProtocolError};
pub use message::{Arg, DecodeError, Inbound, Message, OpenRequest};

/// Protocol major version sent in the announce
pub const API_VERSION_MAJOR: i32 = 1;

/// Protocol minor version sent in the announce
pub const API_VERSION_MINOR: i32 = 0;

/// Environment variable holding the server URL
pub const NSM_URL_ENV: &str = "NSM_URL";

/// Announce request (client → server)
pub const SERVER_ANNOUNCE: &str = "/nsm/server/announce";
/// Success reply
pub const REPLY: &str = "/reply";
/// Error reply
pub const ERROR: &str = "/error";

/// Open command (server → client)
pub const CLIENT_OPEN: &str = "/nsm/client/open";
/// Save command (server → client)
pub const CLIENT_SAVE: &str = "/nsm/client/save";
/// Session loaded notification (server → client)
pub const CLIENT_SESSION_LOADED: &str = "/nsm/client/session_is_loaded";
/// Show optional GUI command (server → client)
pub const CLIENT_SHOW_GUI: &str = "/nsm/client/show_optional_gui";
/// Hide optional GUI command (server → client)
pub const CLIENT_HIDE_GUI: &str = "/nsm/client/hide_optional_gui";

/// Unsaved changes notification (client → server)
pub const CLIENT_IS_DIRTY: &str = "/nsm/client/is_dirty";
/// No unsaved changes notification (client → server)
pub const CLIENT_IS_CLEAN: &str = "/nsm/client/is_clean";
/// Progress notification (client → server)
pub const CLIENT_PROGRESS: &str = "/nsm/client/progress";
/// Status message (client → server)
pub const CLIENT_MESSAGE: &str = "/nsm/client/message";
/// GUI became visible (client → server)
pub const CLIENT_GUI_SHOWN: &str = "/nsm/client/gui_is_shown";
/// GUI became hidden (client → server)
pub const CLIENT_GUI_HIDDEN: &str = "/nsm/client/gui_is_hidden";
