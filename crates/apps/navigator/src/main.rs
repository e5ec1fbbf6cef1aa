use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use credentials::{DEFAULT_CREDENTIAL_KEY, FileStore, ScopedStore};
use locations::LocationRegistry;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use viewport::{
    HeadlessEngineFactory, MarkerId, Navigator, NavigatorConfig, NavigatorError, Notification,
    SessionId, TokenPolicy, drain,
};

mod script;

use script::Step;

#[derive(Debug, Parser)]
#[command(name = "poi-navigator", about = "Point-of-interest navigator on a headless globe")]
struct Cli {
    /// Location document; the built-in case-file locations when omitted.
    #[arg(long, env = "POI_LOCATIONS")]
    locations: Option<PathBuf>,
    /// JSON file the access token is persisted in.
    #[arg(long, env = "POI_STORE", default_value = "poi-navigator.json")]
    store: PathBuf,
    /// Navigator settings document.
    #[arg(long, env = "POI_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the locations in navigation order.
    Locations,
    /// Drive a navigator with a command script, printing notifications as JSON lines.
    Run {
        #[arg(long, conflicts_with = "commands")]
        script: Option<PathBuf>,
        /// Inline script, e.g. "fly 0; wait 2000".
        #[arg(long)]
        commands: Option<String>,
        /// Token submitted before the script runs. Without it the persisted
        /// token, if any, is restored.
        #[arg(long, env = "POI_TOKEN")]
        token: Option<String>,
        /// Tokens the headless engine accepts. Empty accepts everything.
        #[arg(long, default_value = "pk.")]
        accept_prefix: String,
    },
    /// Remove the persisted access token.
    Forget,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Locations => cmd_locations(cli.locations.as_deref()),
        Command::Forget => cmd_forget(&cli.store, &config),
        Command::Run {
            script,
            commands,
            token,
            accept_prefix,
        } => {
            let steps = match (script, commands) {
                (Some(path), _) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading script {path:?}"))?;
                    script::parse(&raw)?
                }
                (None, Some(inline)) => script::parse(&inline)?,
                (None, None) => Vec::new(),
            };
            let host = Host {
                config,
                registry: load_registry(cli.locations.as_deref())?,
                store: Arc::new(FileStore::new(cli.store)),
                factory: Arc::new(HeadlessEngineFactory::new(policy(&accept_prefix))),
            };
            host.run(token, steps).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<NavigatorConfig> {
    match path {
        Some(path) => NavigatorConfig::from_path(path)
            .with_context(|| format!("loading navigator config {path:?}")),
        None => Ok(NavigatorConfig::default()),
    }
}

fn load_registry(path: Option<&Path>) -> anyhow::Result<LocationRegistry> {
    match path {
        Some(path) => LocationRegistry::from_path(path)
            .with_context(|| format!("loading locations {path:?}")),
        None => LocationRegistry::builtin().context("built-in location document"),
    }
}

fn policy(accept_prefix: &str) -> TokenPolicy {
    if accept_prefix.is_empty() {
        TokenPolicy::AcceptAny
    } else {
        TokenPolicy::AcceptPrefix(accept_prefix.to_string())
    }
}

fn cmd_locations(path: Option<&Path>) -> anyhow::Result<()> {
    let registry = load_registry(path)?;
    for (index, location) in registry.all().iter().enumerate() {
        println!(
            "{index}\t{}\t{:.4},{:.4}",
            location.name,
            location.coordinates.lat(),
            location.coordinates.lng()
        );
    }
    Ok(())
}

fn cmd_forget(path: &Path, config: &NavigatorConfig) -> anyhow::Result<()> {
    let key = if config.credential_key.is_empty() {
        DEFAULT_CREDENTIAL_KEY.to_string()
    } else {
        config.credential_key.clone()
    };
    let store = ScopedStore::new(Arc::new(FileStore::new(path)), key);
    if store.remove().context("removing persisted token")? {
        println!("removed persisted token from {path:?}");
    } else {
        println!("no persisted token in {path:?}");
    }
    Ok(())
}

struct Host {
    config: NavigatorConfig,
    registry: LocationRegistry,
    store: Arc<FileStore>,
    factory: Arc<HeadlessEngineFactory>,
}

impl Host {
    fn navigator(&self) -> (Navigator, UnboundedReceiver<Notification>) {
        Navigator::new(
            self.config.clone(),
            self.registry.clone(),
            self.store.clone(),
            self.factory.clone(),
        )
    }

    async fn run(&self, token: Option<String>, steps: Vec<Step>) -> anyhow::Result<()> {
        let (mut nav, mut rx) = self.navigator();
        match token {
            Some(token) => report(nav.submit_credential(&token).await),
            None => report_start(nav.start().await),
        }
        flush(&mut rx)?;

        for step in steps {
            debug!(?step, "step");
            match step {
                Step::Token(token) => report(nav.submit_credential(&token).await),
                Step::Fly(index) => {
                    if let Err(e) = nav.fly_to(index) {
                        debug!(index, "fly-to ignored: {e}");
                    }
                }
                Step::Click(marker) => {
                    if let Err(e) = nav.marker_clicked(MarkerId(marker)) {
                        debug!(marker, "click ignored: {e}");
                    }
                }
                Step::Toggle(index) => nav.toggle_popup(index),
                Step::Wait(duration) => tokio::time::sleep(duration).await,
                Step::Clear => nav.clear_credential(),
                Step::Retry => report(nav.retry().await),
                Step::Unmount => nav.unmount(),
                Step::Restart => {
                    nav.unmount();
                    flush(&mut rx)?;
                    info!("restarting navigator");
                    (nav, rx) = self.navigator();
                    report_start(nav.start().await);
                }
            }
            flush(&mut rx)?;
        }

        // Let the last transition land before shutting down.
        tokio::time::sleep(self.config.transition_duration()).await;
        flush(&mut rx)?;
        nav.unmount();
        Ok(())
    }
}

fn report(result: Result<SessionId, NavigatorError>) {
    match result {
        Ok(id) => info!(%id, "viewport ready"),
        Err(e) => warn!("initialization failed: {e}"),
    }
}

fn report_start(result: Result<Option<SessionId>, NavigatorError>) {
    match result {
        Ok(Some(id)) => info!(%id, "restored persisted credential"),
        Ok(None) => info!("no persisted credential; waiting for a token"),
        Err(e) => warn!("initialization failed: {e}"),
    }
}

fn flush(rx: &mut UnboundedReceiver<Notification>) -> anyhow::Result<()> {
    for notification in drain(rx) {
        println!("{}", serde_json::to_string(&notification)?);
    }
    Ok(())
}
