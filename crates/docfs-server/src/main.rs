//! docfs server binary
//!
//! ## Usage
//!
//! ```bash
//! # Defaults: 127.0.0.1:27117, empty in-memory database
//! docfs-server
//!
//! # With a config file, a seed file and a different port
//! docfs-server --config docfs.toml --seed fixtures/seed.json --port 9000
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use docfs_server::{Namespace, Server, ServerConfig};

/// Serve a document database as a file tree.
#[derive(Parser, Debug)]
#[command(name = "docfs-server")]
#[command(about = "Serve a document database as a file tree")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Port to listen on (keeps the configured address)
    #[arg(short, long)]
    port: Option<u16>,

    /// Logical database name
    #[arg(long)]
    database: Option<String>,

    /// JSON file of collections to load at startup
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Name of the namespace directory
    #[arg(long)]
    mount: Option<String>,
}

impl Args {
    fn config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(seed) = &self.seed {
            config.seed = Some(seed.clone());
        }
        if let Some(mount) = &self.mount {
            config.mount = mount.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.config()?;
    let namespace = Namespace::build(&config).await?;
    let server = Server::bind(config.bind_addr, namespace.fs.clone())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    server.run_until(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
