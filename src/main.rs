//! # cosmosdb-mongo
//!
//! Command-line driver for the Cosmos DB MongoDB database reconciler.
//!
//! Each invocation runs exactly one operation:
//!
//! 1. **Config** - load `[provider]` and `[database]` from the TOML file
//! 2. **Emulator** - restore the control plane snapshot
//! 3. **Operation** - run create/read/update/delete/import/migrate-capacity
//! 4. **Persist** - write state and the snapshot back to disk
//!
//! Ctrl+C cancels the in-flight operation; nothing is written to state in
//! that case.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cosmosdb_mongo::cli::Cli;
use cosmosdb_mongo::commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    commands::execute_command(cli).await
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
