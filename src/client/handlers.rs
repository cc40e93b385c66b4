//! Lifecycle handlers.
//!
//! One trait per lifecycle event. Closures with the matching signature
//! implement the traits, so most applications never name them:
//!
//! ```rust,ignore
//! ClientBuilder::new("Looper")
//!     .on_open(|req: &OpenRequest| {
//!         std::fs::create_dir_all(&req.project_path)?;
//!         Ok(())
//!     })
//!     .on_save(|| Err(ProtocolError::new(ErrorCode::NotNow, "recording").into()));
//! ```
//!
//! Handlers run on the command router task. A slow handler delays every
//! command behind it, so long work should be handed off.

use thiserror::Error;

use crate::protocol::{ErrorCode, OpenRequest, ProtocolError};

/// Failure reported by a handler
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    /// Untyped failure, reported with the general error code
    #[error("{0}")]
    Generic(String),

    /// Failure with a specific NSM error code
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl HandlerError {
    /// Untyped failure from a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic(message.into())
    }

    /// Code to put on the wire
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Generic(_) => ErrorCode::General,
            Self::Protocol(err) => err.code,
        }
    }

    /// Message to put on the wire
    pub fn message(&self) -> &str {
        match self {
            Self::Generic(message) => message,
            Self::Protocol(err) => &err.message,
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::Generic(err.to_string())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ProtocolError>() {
            Ok(protocol) => Self::Protocol(protocol),
            Err(other) => Self::Generic(format!("{other:#}")),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::Generic(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::Generic(message.to_string())
    }
}

/// Result returned by open and save handlers
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Handles `/nsm/client/open`
pub trait OpenHandler: Send + Sync {
    /// Open or create the project at `request.project_path`
    fn open(&self, request: &OpenRequest) -> HandlerResult;
}

impl<F> OpenHandler for F
where
    F: Fn(&OpenRequest) -> HandlerResult + Send + Sync,
{
    fn open(&self, request: &OpenRequest) -> HandlerResult {
        self(request)
    }
}

/// Handles `/nsm/client/save`
pub trait SaveHandler: Send + Sync {
    /// Save the current project
    fn save(&self) -> HandlerResult;
}

impl<F> SaveHandler for F
where
    F: Fn() -> HandlerResult + Send + Sync,
{
    fn save(&self) -> HandlerResult {
        self()
    }
}

/// Handles `/nsm/client/show_optional_gui` and `/nsm/client/hide_optional_gui`
pub trait OptionalGuiHandler: Send + Sync {
    /// Show (`true`) or hide (`false`) the GUI
    fn set_visible(&self, visible: bool);
}

impl<F> OptionalGuiHandler for F
where
    F: Fn(bool) + Send + Sync,
{
    fn set_visible(&self, visible: bool) {
        self(visible);
    }
}

/// Handles `/nsm/client/session_is_loaded`
pub trait SessionLoadedHandler: Send + Sync {
    /// Every client of the session has been opened
    fn session_loaded(&self);
}

impl<F> SessionLoadedHandler for F
where
    F: Fn() + Send + Sync,
{
    fn session_loaded(&self) {
        self();
    }
}
