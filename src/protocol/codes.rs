//! NSM error vocabulary.
//!
//! Closed set of negative integer codes carried in `/error` replies, plus
//! the [`ProtocolError`] value handlers use to pick a specific code.

use std::fmt;

use thiserror::Error;

/// Error codes defined by the NSM API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unspecified failure (-1)
    General,
    /// Incompatible API version (-2)
    IncompatibleApi,
    /// Client is blacklisted (-3)
    Blacklisted,
    /// Client could not be launched (-4)
    LaunchFailed,
    /// No such file (-5)
    NoSuchFile,
    /// No session is open (-6)
    NoSessionOpen,
    /// Unsaved changes would be lost (-7)
    UnsavedChanges,
    /// Operation cannot be done now (-8)
    NotNow,
    /// Project is damaged or unreadable (-9)
    BadProject,
    /// Project could not be created (-10)
    CreateFailed,
    /// Code outside the known vocabulary, kept as received
    Unknown(i32),
}

impl ErrorCode {
    /// All codes of the closed vocabulary, in numeric order.
    pub const ALL: [ErrorCode; 10] = [
        ErrorCode::General,
        ErrorCode::IncompatibleApi,
        ErrorCode::Blacklisted,
        ErrorCode::LaunchFailed,
        ErrorCode::NoSuchFile,
        ErrorCode::NoSessionOpen,
        ErrorCode::UnsavedChanges,
        ErrorCode::NotNow,
        ErrorCode::BadProject,
        ErrorCode::CreateFailed,
    ];

    /// Wire integer for this code
    pub fn code(self) -> i32 {
        match self {
            Self::General => -1,
            Self::IncompatibleApi => -2,
            Self::Blacklisted => -3,
            Self::LaunchFailed => -4,
            Self::NoSuchFile => -5,
            Self::NoSessionOpen => -6,
            Self::UnsavedChanges => -7,
            Self::NotNow => -8,
            Self::BadProject => -9,
            Self::CreateFailed => -10,
            Self::Unknown(code) => code,
        }
    }

    /// Human-readable description
    pub fn description(self) -> &'static str {
        match self {
            Self::General => "general error",
            Self::IncompatibleApi => "incompatible API version",
            Self::Blacklisted => "client blacklisted",
            Self::LaunchFailed => "launch failed",
            Self::NoSuchFile => "no such file",
            Self::NoSessionOpen => "no session open",
            Self::UnsavedChanges => "unsaved changes",
            Self::NotNow => "not now",
            Self::BadProject => "bad project",
            Self::CreateFailed => "create failed",
            Self::Unknown(_) => "unknown error",
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|known| known.code() == code)
            .unwrap_or(Self::Unknown(code))
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Code plus message, as sent in an `/error` reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({code})")]
pub struct ProtocolError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
}

impl ProtocolError {
    /// Create a new protocol error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
