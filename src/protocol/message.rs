//! Protocol messages for NSM communication.
//!
//! A [`Message`] is an OSC address plus typed arguments. Outbound messages
//! are built with the constructors below; inbound messages are checked
//! against a per-address type signature by [`Inbound::decode`] before any
//! argument is read.

use std::fmt;

use thiserror::Error;

use super::codes::ErrorCode;
use super::{
    API_VERSION_MAJOR, API_VERSION_MINOR, CLIENT_GUI_HIDDEN, CLIENT_GUI_SHOWN, CLIENT_HIDE_GUI,
    CLIENT_IS_CLEAN, CLIENT_IS_DIRTY, CLIENT_MESSAGE, CLIENT_OPEN, CLIENT_PROGRESS, CLIENT_SAVE,
    CLIENT_SESSION_LOADED, CLIENT_SHOW_GUI, ERROR, REPLY, SERVER_ANNOUNCE,
};

/// A typed message argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// OSC string (`s`)
    Str(String),
    /// OSC 32-bit integer (`i`)
    Int(i32),
    /// OSC 32-bit float (`f`)
    Float(f32),
}

impl Arg {
    /// OSC type tag character
    pub fn tag(&self) -> char {
        match self {
            Self::Str(_) => 's',
            Self::Int(_) => 'i',
            Self::Float(_) => 'f',
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i32> for Arg {
    fn from(i: i32) -> Self {
        Self::Int(i)
    }
}

impl From<f32> for Arg {
    fn from(f: f32) -> Self {
        Self::Float(f)
    }
}

/// Protocol message envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// OSC address
    pub address: String,
    /// Arguments in order
    pub args: Vec<Arg>,
}

impl Message {
    /// Create a message without arguments
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Type tag signature of the arguments, e.g. `"sis"`
    pub fn type_tags(&self) -> String {
        self.args.iter().map(Arg::tag).collect()
    }

    /// Create the announce message
    pub fn announce(name: &str, capabilities: &str, executable: &str, pid: i32) -> Self {
        Self::new(SERVER_ANNOUNCE)
            .arg(name)
            .arg(capabilities)
            .arg(executable)
            .arg(API_VERSION_MAJOR)
            .arg(API_VERSION_MINOR)
            .arg(pid)
    }

    /// Create a success reply for a command
    pub fn reply_ok(address: &str) -> Self {
        Self::new(REPLY).arg(address).arg("ok")
    }

    /// Create an error reply for a command
    pub fn error(address: &str, code: ErrorCode, message: &str) -> Self {
        Self::new(ERROR).arg(address).arg(code.code()).arg(message)
    }

    /// Create an `is_dirty` / `is_clean` notification
    pub fn dirty(dirty: bool) -> Self {
        Self::new(if dirty { CLIENT_IS_DIRTY } else { CLIENT_IS_CLEAN })
    }

    /// Create a progress notification, value clamped to 0.0 - 1.0
    pub fn progress(value: f32) -> Self {
        Self::new(CLIENT_PROGRESS).arg(value.clamp(0.0, 1.0))
    }

    /// Create a status message, priority clamped to 0 - 3
    pub fn status(priority: i32, text: &str) -> Self {
        Self::new(CLIENT_MESSAGE).arg(priority.clamp(0, 3)).arg(text)
    }

    /// Create a `gui_is_shown` / `gui_is_hidden` notification
    pub fn gui_visible(visible: bool) -> Self {
        Self::new(if visible { CLIENT_GUI_SHOWN } else { CLIENT_GUI_HIDDEN })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ,{}", self.address, self.type_tags())
    }
}

/// Arguments of an open command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Path prefix the client should save its project under
    pub project_path: String,
    /// Name to show to the user
    pub display_name: String,
    /// Unique client id assigned by the server
    pub client_id: String,
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Successful reply to the announce
    AnnounceReply {
        /// Greeting from the server
        message: String,
        /// Server name
        server_name: String,
        /// Colon-delimited server capability list
        capabilities: String,
    },
    /// Successful reply to some other request
    Reply {
        /// Address being replied to
        address: String,
    },
    /// Error reply
    Error {
        /// Address being replied to
        address: String,
        /// Error code
        code: ErrorCode,
        /// Error message
        message: String,
    },
    /// Open (or create) a project
    Open(OpenRequest),
    /// Save the current project
    Save,
    /// All clients of the session have been opened
    SessionLoaded,
    /// Show the optional GUI
    ShowOptionalGui,
    /// Hide the optional GUI
    HideOptionalGui,
}

/// Why an inbound message could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No route for this address
    #[error("Unknown address: {0}")]
    UnknownAddress(String),

    /// Argument count or types do not match the address signature
    #[error("Shape mismatch for {address}: expected ,{expected} got ,{found}")]
    ShapeMismatch {
        /// Message address
        address: String,
        /// Expected type tags
        expected: &'static str,
        /// Received type tags
        found: String,
    },
}

const ANNOUNCE_REPLY_SIGNATURE: &str = "ssss";
const ERROR_SIGNATURE: &str = "sis";
const OPEN_SIGNATURE: &str = "sss";
const NO_ARGS: &str = "";

impl Inbound {
    /// Schema-checked decode of an inbound message
    pub fn decode(msg: &Message) -> Result<Self, DecodeError> {
        match msg.address.as_str() {
            REPLY => Self::decode_reply(msg),
            ERROR => {
                check_shape(msg, ERROR_SIGNATURE)?;
                Ok(Self::Error {
                    address: string_at(msg, 0),
                    code: ErrorCode::from(msg.args[1].as_int().unwrap_or_default()),
                    message: string_at(msg, 2),
                })
            },
            CLIENT_OPEN => {
                check_shape(msg, OPEN_SIGNATURE)?;
                Ok(Self::Open(OpenRequest {
                    project_path: string_at(msg, 0),
                    display_name: string_at(msg, 1),
                    client_id: string_at(msg, 2),
                }))
            },
            CLIENT_SAVE => check_shape(msg, NO_ARGS).map(|()| Self::Save),
            CLIENT_SESSION_LOADED => check_shape(msg, NO_ARGS).map(|()| Self::SessionLoaded),
            CLIENT_SHOW_GUI => check_shape(msg, NO_ARGS).map(|()| Self::ShowOptionalGui),
            CLIENT_HIDE_GUI => check_shape(msg, NO_ARGS).map(|()| Self::HideOptionalGui),
            other => Err(DecodeError::UnknownAddress(other.to_string())),
        }
    }

    fn decode_reply(msg: &Message) -> Result<Self, DecodeError> {
        let replied = match msg.args.first().and_then(Arg::as_str) {
            Some(address) if msg.args.len() >= 2 => address,
            _ => {
                return Err(DecodeError::ShapeMismatch {
                    address: msg.address.clone(),
                    expected: "s*",
                    found: msg.type_tags(),
                })
            },
        };

        if replied != SERVER_ANNOUNCE {
            return Ok(Self::Reply {
                address: replied.to_string(),
            });
        }

        check_shape(msg, ANNOUNCE_REPLY_SIGNATURE)?;
        Ok(Self::AnnounceReply {
            message: string_at(msg, 1),
            server_name: string_at(msg, 2),
            capabilities: string_at(msg, 3),
        })
    }
}

fn check_shape(msg: &Message, expected: &'static str) -> Result<(), DecodeError> {
    let found = msg.type_tags();
    if found == expected {
        Ok(())
    } else {
        Err(DecodeError::ShapeMismatch {
            address: msg.address.clone(),
            expected,
            found,
        })
    }
}

/// Only called after `check_shape` has confirmed position `i` is a string
fn string_at(msg: &Message, i: usize) -> String {
    msg.args[i].as_str().unwrap_or_default().to_string()
}
