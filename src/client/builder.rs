//! Client configuration.
//!
//! [`ClientBuilder`] collects the application name, declared capabilities
//! and one handler per lifecycle event. [`ClientBuilder::build`] validates
//! them once and produces an immutable [`ClientConfig`]; a config that
//! exists is a config that is complete.

use std::fmt;

use super::handlers::{OpenHandler, OptionalGuiHandler, SaveHandler, SessionLoadedHandler};
use super::SessionClient;
use crate::config::{ClientSettings, ServerAddress};
use crate::error::{NsmError, Result};
use crate::protocol::{CapabilitySet, ClientCapability};
use crate::transport::{Connector, UdpConnector};

/// Validated, immutable client configuration
pub struct ClientConfig {
    pub(crate) name: String,
    pub(crate) executable: String,
    pub(crate) capabilities: CapabilitySet<ClientCapability>,
    pub(crate) open: Box<dyn OpenHandler>,
    pub(crate) save: Box<dyn SaveHandler>,
    pub(crate) optional_gui: Option<Box<dyn OptionalGuiHandler>>,
    pub(crate) session_loaded: Option<Box<dyn SessionLoadedHandler>>,
}

impl ClientConfig {
    /// Application name sent in the announce
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executable name sent in the announce
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Declared client capabilities
    pub fn capabilities(&self) -> &CapabilitySet<ClientCapability> {
        &self.capabilities
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("name", &self.name)
            .field("executable", &self.executable)
            .field("capabilities", &self.capabilities.encode())
            .field("optional_gui", &self.optional_gui.is_some())
            .field("session_loaded", &self.session_loaded.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClientConfig`]
pub struct ClientBuilder {
    name: String,
    executable: Option<String>,
    capabilities: CapabilitySet<ClientCapability>,
    open: Option<Box<dyn OpenHandler>>,
    save: Option<Box<dyn SaveHandler>>,
    optional_gui: Option<Box<dyn OptionalGuiHandler>>,
    session_loaded: Option<Box<dyn SessionLoadedHandler>>,
}

impl ClientBuilder {
    /// Start a configuration for the application `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: None,
            capabilities: CapabilitySet::new(),
            open: None,
            save: None,
            optional_gui: None,
            session_loaded: None,
        }
    }

    /// Replace the declared capabilities
    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = ClientCapability>) -> Self {
        self.capabilities = caps.into_iter().collect();
        self
    }

    /// Declare one more capability
    pub fn with_capability(mut self, cap: ClientCapability) -> Self {
        self.capabilities.insert(cap);
        self
    }

    /// Override the executable name sent in the announce (defaults to argv[0])
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Set the open handler (mandatory)
    pub fn on_open(mut self, handler: impl OpenHandler + 'static) -> Self {
        self.open = Some(Box::new(handler));
        self
    }

    /// Set the save handler (mandatory)
    pub fn on_save(mut self, handler: impl SaveHandler + 'static) -> Self {
        self.save = Some(Box::new(handler));
        self
    }

    /// Set the optional GUI handler (mandatory with `optional-gui`)
    pub fn on_optional_gui(mut self, handler: impl OptionalGuiHandler + 'static) -> Self {
        self.optional_gui = Some(Box::new(handler));
        self
    }

    /// Set the session-loaded handler
    pub fn on_session_loaded(mut self, handler: impl SessionLoadedHandler + 'static) -> Self {
        self.session_loaded = Some(Box::new(handler));
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<ClientConfig> {
        let open = self.open.ok_or_else(|| {
            NsmError::Configuration("no client open handler configured".to_string())
        })?;
        let save = self.save.ok_or_else(|| {
            NsmError::Configuration("no client save handler configured".to_string())
        })?;
        if self.capabilities.contains(&ClientCapability::OptionalGui) && self.optional_gui.is_none()
        {
            return Err(NsmError::Configuration(
                "capability optional-gui set, but no optional gui handler configured".to_string(),
            ));
        }

        let executable = self
            .executable
            .or_else(|| std::env::args().next())
            .unwrap_or_default();

        Ok(ClientConfig {
            name: self.name,
            executable,
            capabilities: self.capabilities,
            open,
            save,
            optional_gui: self.optional_gui,
            session_loaded: self.session_loaded,
        })
    }

    /// Build, discover the server from `NSM_URL`, load settings and connect
    /// over UDP.
    pub async fn connect(self) -> Result<SessionClient> {
        let config = self.build()?;
        let address = ServerAddress::from_env()?;
        let settings = ClientSettings::load(None)?;
        SessionClient::connect(config, &settings, address, &UdpConnector).await
    }

    /// Build and connect through an explicit connector.
    pub async fn connect_with(
        self,
        address: ServerAddress,
        settings: &ClientSettings,
        connector: &dyn Connector,
    ) -> Result<SessionClient> {
        let config = self.build()?;
        SessionClient::connect(config, settings, address, connector).await
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities.encode())
            .field("open", &self.open.is_some())
            .field("save", &self.save.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HandlerResult;
    use crate::protocol::OpenRequest;

    fn open_ok(_: &OpenRequest) -> HandlerResult {
        Ok(())
    }

    fn save_ok() -> HandlerResult {
        Ok(())
    }

    #[test]
    fn test_missing_open_handler() {
        let err = ClientBuilder::new("App").on_save(save_ok).build().unwrap_err();
        assert_eq!(
            err,
            NsmError::Configuration("no client open handler configured".to_string())
        );
    }

    #[test]
    fn test_missing_save_handler() {
        let err = ClientBuilder::new("App").on_open(open_ok).build().unwrap_err();
        assert_eq!(
            err,
            NsmError::Configuration("no client save handler configured".to_string())
        );
    }

    #[test]
    fn test_optional_gui_requires_handler() {
        let builder = ClientBuilder::new("App")
            .on_open(open_ok)
            .on_save(save_ok)
            .with_capability(ClientCapability::OptionalGui);
        assert!(builder.build().unwrap_err().is_configuration());

        let config = ClientBuilder::new("App")
            .on_open(open_ok)
            .on_save(save_ok)
            .with_capability(ClientCapability::OptionalGui)
            .on_optional_gui(|_visible: bool| {})
            .build()
            .unwrap();
        assert!(config.capabilities().contains(&ClientCapability::OptionalGui));
    }

    #[test]
    fn test_with_capabilities_replaces() {
        let config = ClientBuilder::new("App")
            .with_capability(ClientCapability::Progress)
            .with_capabilities([ClientCapability::Switch, ClientCapability::Dirty])
            .with_executable("/usr/bin/app")
            .on_open(open_ok)
            .on_save(save_ok)
            .build()
            .unwrap();

        assert_eq!(config.capabilities().encode(), ":switch:dirty:");
        assert_eq!(config.executable(), "/usr/bin/app");
        assert_eq!(config.name(), "App");
    }
}
