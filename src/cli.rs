//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cosmosdb_mongo_reconciler::CapacityMode;

/// cosmosdb-mongo - declarative Cosmos DB MongoDB databases
#[derive(Parser, Debug)]
#[command(name = "cosmosdb-mongo")]
#[command(version)]
#[command(about = "Reconcile a Cosmos DB MongoDB database against a TOML configuration")]
#[command(
    long_about = "Creates, reads, updates and deletes one MongoDB database in a Cosmos DB account, keeping a local state file in sync with what the control plane reports."
)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "cosmosdb.toml")]
    pub config: PathBuf,

    /// State file
    #[arg(short, long, global = true, default_value = "cosmosdb.state.json")]
    pub state: PathBuf,

    /// Emulated control plane snapshot
    #[arg(short, long, global = true, default_value = "cosmosdb.emulator.json")]
    pub emulator: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database described in the config
    Create,

    /// Refresh state from the control plane
    Read,

    /// Apply the config to the database in state
    Update,

    /// Delete the database in state
    Delete,

    /// Adopt an existing database into state
    Import {
        /// Resource ID of the database
        id: String,
    },

    /// Switch the throughput mode of the database in state
    MigrateCapacity {
        /// Target mode (manual, autoscale)
        #[arg(long)]
        to: CapacityMode,
    },

    /// Rewrite the state file at the current schema version
    UpgradeState,

    /// Manage the emulated control plane
    Emulator {
        #[command(subcommand)]
        command: EmulatorCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum EmulatorCommands {
    /// Register a database account
    AddAccount {
        /// Resource group of the account
        #[arg(long)]
        resource_group: String,

        /// Account name
        #[arg(long)]
        name: String,

        /// Create a serverless account
        #[arg(long, default_value_t = false)]
        serverless: bool,
    },
}
