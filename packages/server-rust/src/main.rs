//! RapidoDB server binary.
//!
//! Thin glue around [`RapidoDb`]: reads the environment, initializes
//! logging, and runs until interrupted.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rapido_server::{DbConfig, NetworkConfig, RapidoDb};
use tracing::info;
use tracing_subscriber::EnvFilter;

const BANNER: &str = r"
************************************************
   ____             _     _       ____  ____
  |  _ \ __ _ _ __ (_) __| | ___ |  _ \| __ )
  | |_) / _  |  _ \| |/ _  |/ _ \| | | |  _ \
  |  _ < (_| | |_) | | (_| | (_) | |_| | |_) |
  |_| \_\__,_| .__/|_|\__,_|\___/|____/|____/
             |_|
************************************************
";

#[derive(Debug, Parser)]
#[command(
    name = "rapido-server",
    about = "In-memory key/value database speaking RQL over TCP"
)]
struct Args {
    /// Port for the TCP listener.
    #[arg(long, env = "RAPIDO_PORT", default_value_t = 2310)]
    port: u16,

    /// Username of the bootstrap admin user.
    #[arg(long = "user", env = "RAPIDO_USER", default_value = "admin")]
    username: String,

    /// Password of the bootstrap admin user.
    #[arg(long = "pass", env = "RAPIDO_PASS", default_value = "pass")]
    password: String,

    /// Directory the snapshot files are kept in.
    #[arg(long, env = "HOME")]
    backup_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    println!("{BANNER}");

    let config = DbConfig {
        network: NetworkConfig {
            port: args.port,
            ..NetworkConfig::default()
        },
        admin_username: args.username,
        admin_password: args.password,
        backup_dir: args.backup_dir,
        ..DbConfig::default()
    };

    let mut db = RapidoDb::new(config).context("failed to open stores")?;
    let port = db.start().await.context("failed to bind TCP listener")?;
    info!(port, "accepting connections");

    db.serve(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await
}
