//! urlcache - fetch images through the cache-first repository.
//!
//! Every URL is requested several times at once, then once more after the
//! first round settles, so the log shows both network and cache paths.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod session;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let repository = cli.build_repository()?;
    let summary = session::run(&repository, &cli.urls(), cli.repeat).await;

    info!(
        succeeded = summary.succeeded,
        undecodable = summary.undecodable,
        failed = summary.failed,
        "Session finished"
    );

    Ok(())
}
