//! Postwire server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Settings come from a TOML file (`--config`, `POSTWIRE_CONFIG`, or the
//! default locations) with `POSTWIRE_*` environment overrides. `RUST_LOG`
//! takes precedence over `logging.level`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use postwire::api::{self, AppState};
use postwire::config::{generate_default_config, Config};
use postwire::repository::SqliteRepository;
use postwire::websocket::ConnectionHub;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "postwire")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Blog API with live post notifications over WebSocket")]
struct Cli {
    /// Path to the config file
    #[arg(short, long, env = "POSTWIRE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP and WebSocket server (default)
    Serve,

    /// Print a default config file
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Config { output } => write_default_config(output),
        Commands::Serve => {
            // No subscriber exists yet, so load errors are returned, not logged
            let (config, source) = match cli.config {
                Some(path) => (Config::load_with_env(&path)?, Some(path)),
                None => Config::load_default()?,
            };
            init_tracing(&config);

            match source {
                Some(path) => tracing::info!("Loaded config from {}", path.display()),
                None => tracing::info!("Using default config with environment overrides"),
            }
            run_server(config).await
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "postwire={},tower_http=info",
            config.logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    tracing::info!("Starting Postwire v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database: {}", config.database.path);

    let repository = SqliteRepository::open(Path::new(&config.database.path))
        .with_context(|| format!("opening database {}", config.database.path))?;

    let (hub, dispatcher) = ConnectionHub::new(config.hub.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher_task = tokio::spawn(dispatcher.run(wait_for(shutdown_rx.clone())));

    tokio::spawn(async move {
        api::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let state = AppState::new(Arc::new(repository), hub, config);
    let served = api::serve(state, wait_for(shutdown_rx)).await;

    // Closes every live session once the listener has stopped.
    if let Err(e) = dispatcher_task.await {
        tracing::error!(error = %e, "Dispatcher task failed");
    }

    served?;
    tracing::info!("Postwire stopped");
    Ok(())
}

/// Resolves once the shutdown flag flips to `true` or its sender is gone
async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    loop {
        let stopping = *shutdown.borrow_and_update();
        if stopping || shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn write_default_config(output: Option<PathBuf>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
