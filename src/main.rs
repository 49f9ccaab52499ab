//! resonance: run a demonstration session on the orchestration kernel
//!
//! Usage:
//!   resonance                               → demo session for telos "healing"
//!   resonance --telos relaxation --telos insight
//!   resonance --config resonance.toml       → load kernel settings
//!   resonance --dump-config                 → print default settings as TOML

use clap::Parser;
use resonance::demo;
use resonance::{Kernel, KernelConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "resonance",
    about = "Module orchestration kernel for generative art sessions",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Path to config file (TOML). Defaults are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dump default config as TOML and exit.
    #[arg(long)]
    dump_config: bool,

    /// Telos to orchestrate for (repeatable)
    #[arg(long = "telos", default_value = "healing")]
    telos: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        println!("{}", KernelConfig::default().to_toml());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| resonance::DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &cli.config {
        Some(path) => KernelConfig::load(path),
        None => KernelConfig::default(),
    };

    let kernel = Kernel::new(config);
    let (activated, field) = demo::run_session(&kernel, &cli.telos).await?;
    info!("Session for {:?} activated {} modules", cli.telos, activated.len());

    println!("{}", serde_json::to_string_pretty(&field)?);

    kernel.shutdown().await;
    Ok(())
}
