//! Capabilities for the announce handshake.
//!
//! Both sides advertise a colon-delimited token list: the client in its
//! announce, the server in the announce reply. The two vocabularies are
//! disjoint even where the token text overlaps (`optional-gui`).

use std::fmt;
use std::str::FromStr;

/// A capability token that can appear in a wire capability list
pub trait Capability: Clone + PartialEq {
    /// Wire token
    fn token(&self) -> &str;

    /// Parse a wire token, `None` when the token is not understood
    fn from_token(token: &str) -> Option<Self>;
}

/// Capabilities a session server may advertise
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerCapability {
    /// Server accepts control messages from clients (`server_control`)
    ServerControl,
    /// Server relays broadcast messages (`broadcast`)
    Broadcast,
    /// Server can show/hide client GUIs (`optional-gui`)
    OptionalGui,
    /// Token this client does not know, kept verbatim
    Other(String),
}

impl Capability for ServerCapability {
    fn token(&self) -> &str {
        match self {
            Self::ServerControl => "server_control",
            Self::Broadcast => "broadcast",
            Self::OptionalGui => "optional-gui",
            Self::Other(token) => token,
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "server_control" => Self::ServerControl,
            "broadcast" => Self::Broadcast,
            "optional-gui" => Self::OptionalGui,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Capabilities this client may declare in its announce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCapability {
    /// Client can switch projects without restarting (`switch`)
    Switch,
    /// Client reports unsaved changes (`dirty`)
    Dirty,
    /// Client reports progress of long operations (`progress`)
    Progress,
    /// Client sends status messages (`message`)
    Message,
    /// Client has a GUI the server may show/hide (`optional-gui`)
    OptionalGui,
}

impl ClientCapability {
    /// Every client capability
    pub const ALL: [ClientCapability; 5] = [
        ClientCapability::Switch,
        ClientCapability::Dirty,
        ClientCapability::Progress,
        ClientCapability::Message,
        ClientCapability::OptionalGui,
    ];
}

impl Capability for ClientCapability {
    fn token(&self) -> &str {
        match self {
            Self::Switch => "switch",
            Self::Dirty => "dirty",
            Self::Progress => "progress",
            Self::Message => "message",
            Self::OptionalGui => "optional-gui",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.token() == token)
    }
}

impl FromStr for ClientCapability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_token(&s.to_lowercase())
            .ok_or_else(|| format!("Unknown client capability: {}", s))
    }
}

impl fmt::Display for ClientCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl fmt::Display for ServerCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Ordered, duplicate-free set of capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet<C> {
    caps: Vec<C>,
}

impl<C> Default for CapabilitySet<C> {
    fn default() -> Self {
        Self { caps: Vec::new() }
    }
}

impl<C: Capability> CapabilitySet<C> {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability, ignoring duplicates
    pub fn insert(&mut self, cap: C) {
        if !self.contains(&cap) {
            self.caps.push(cap);
        }
    }

    /// Membership test
    pub fn contains(&self, cap: &C) -> bool {
        self.caps.contains(cap)
    }

    /// Number of capabilities
    pub fn len(&self) -> usize {
        self.caps.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &C> {
        self.caps.iter()
    }

    /// Render as a wire list: `:a:b:`, or `::` when empty
    pub fn encode(&self) -> String {
        let mut list = String::from(":");
        for cap in &self.caps {
            list.push_str(cap.token());
            list.push(':');
        }
        if self.caps.is_empty() {
            list.push(':');
        }
        list
    }

    /// Parse a wire list. Bracketing colons are optional, empty and
    /// unknown tokens are skipped.
    pub fn decode(list: &str) -> Self {
        list.split(':')
            .filter(|token| !token.is_empty())
            .filter_map(C::from_token)
            .collect()
    }
}

impl<C: Capability> FromIterator<C> for CapabilitySet<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut set = Self::new();
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}
