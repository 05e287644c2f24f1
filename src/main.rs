use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crmdesk::{
    config::{AppConfig, Backend, Overrides},
    core::db::{local::LocalStore, remote::RestBackend},
    logging,
};

#[derive(Parser)]
#[command(name = "crmdesk")]
#[command(about = "Contacts, companies, deals and tasks for a small business")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data backend to use
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// SQLite database file for the local backend
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

enum Launch {
    Local(LocalStore),
    Remote(RestBackend),
}

async fn open_backend(config: &AppConfig) -> anyhow::Result<Launch> {
    match config.backend {
        Backend::Local => {
            let path = &config.local.database;
            tracing::info!(database = %path.display(), "opening local store");
            let mut store = LocalStore::open(path)
                .await
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            if !config.local.require_confirmation {
                store = store.without_email_confirmation();
            }
            Ok(Launch::Local(store))
        }
        Backend::Remote => {
            let url = config.remote.url.as_deref().unwrap_or_default();
            let key = config.remote.anon_key.as_deref().unwrap_or_default();
            tracing::info!(url, "using remote backend");
            Ok(Launch::Remote(
                RestBackend::new(url, key).context("Failed to set up the remote backend")?,
            ))
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    logging::init(args.verbose);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    let _guard = runtime.enter();

    let overrides = Overrides {
        backend: args.backend,
        database: args.database,
    };
    let launched = AppConfig::load(args.config.as_deref(), &overrides)
        .and_then(|config| runtime.block_on(open_backend(&config)));

    run(launched)
}

#[cfg(feature = "gui")]
fn run(launched: anyhow::Result<Launch>) -> anyhow::Result<()> {
    use crmdesk::gui;

    match launched {
        Ok(Launch::Local(store)) => gui::run(store)?,
        Ok(Launch::Remote(backend)) => gui::run(backend)?,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "startup failed");
            gui::run_fatal(format!("{e:#}"))?;
        }
    }
    Ok(())
}

#[cfg(not(feature = "gui"))]
fn run(launched: anyhow::Result<Launch>) -> anyhow::Result<()> {
    launched?;
    anyhow::bail!("crmdesk was built without the `gui` feature")
}
