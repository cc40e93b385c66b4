//! Example NSM client.
//!
//! Announces itself to the session server named by `NSM_URL`, creates the
//! project directory on open and writes `test_save_file.txt` into it on
//! save. Runs until Ctrl-C or until the connection fails.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nsm::{
    client::HandlerResult, ClientBuilder, ClientCapability, ClientSettings, ClientState,
    ErrorCode, OpenRequest, ProtocolError, ServerAddress, UdpConnector, VERSION,
};
use parking_lot::Mutex;

#[derive(Parser)]
#[command(name = "nsm-example-client")]
#[command(version = VERSION)]
#[command(about = "Example client for the Non Session Manager", long_about = None)]
struct Cli {
    /// Application name sent in the announce
    #[arg(short, long, default_value = "NSM Example Client")]
    name: String,

    /// Declared capability (switch, dirty, progress, message, optional-gui)
    #[arg(short, long = "capability", default_values_t = [ClientCapability::Switch])]
    capabilities: Vec<ClientCapability>,

    /// Save here instead of the project path given by the server
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Settings file (default: the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// What the last open told us
#[derive(Debug, Default)]
struct Project {
    /// `None` until the server opened a project
    path: Option<PathBuf>,
    client_id: String,
}

impl Project {
    fn save(&self) -> HandlerResult {
        let Some(path) = &self.path else {
            return Err(ProtocolError::new(ErrorCode::NoSessionOpen, "no project opened yet").into());
        };

        let mut file = fs::File::create(path.join("test_save_file.txt"))?;
        writeln!(file, "Hello, World!")?;
        writeln!(file, "ClientID: {}", self.client_id)?;
        tracing::info!("Saved to {}", path.display());
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let settings = ClientSettings::load(cli.config.as_deref())?;
    let address = ServerAddress::from_env()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli, settings, address))
}

async fn run(cli: Cli, settings: ClientSettings, address: ServerAddress) -> anyhow::Result<()> {
    let project = Arc::new(Mutex::new(Project::default()));
    let save_dir = cli.save_dir;

    let on_open = {
        let project = Arc::clone(&project);
        move |req: &OpenRequest| -> HandlerResult {
            let path = save_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&req.project_path));
            fs::create_dir_all(&path)?;
            tracing::info!("Project {} opened at {}", req.display_name, path.display());

            let mut project = project.lock();
            project.path = Some(path);
            project.client_id = req.client_id.clone();
            Ok(())
        }
    };

    let on_save = {
        let project = Arc::clone(&project);
        move || project.lock().save()
    };

    let client = ClientBuilder::new(cli.name)
        .with_capabilities(cli.capabilities)
        .on_open(on_open)
        .on_save(on_save)
        .on_optional_gui(|visible: bool| {
            tracing::info!("GUI {}", if visible { "shown" } else { "hidden" });
        })
        .on_session_loaded(|| tracing::info!("Session loaded"))
        .connect_with(address, &settings, &UdpConnector)
        .await?;

    tracing::info!(
        "Connected to {} ({})",
        client.server_name(),
        client.server_message()
    );
    client.send_message(0, "ready").await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            },
            () = tokio::time::sleep(Duration::from_secs(1)) => {},
        }

        if client.state() == ClientState::Error {
            let reason = client
                .last_error()
                .map_or_else(|| "unknown error".to_string(), |e| e.to_string());
            anyhow::bail!("connection to session server failed: {reason}");
        }
    }

    client.close();
    Ok(())
}
