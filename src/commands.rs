//! CLI command handlers.
//!
//! Every command that talks to the control plane loads the emulator
//! snapshot, runs one reconciler operation and writes the snapshot back,
//! even when the operation failed part-way.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::signal;
use tracing::{error, info, warn};

use cosmosdb_mongo_reconciler::{
    AccountEntry, Canceller, CapacityMode, DatabaseAccountId, InMemoryControlPlane,
    OperationContext, PersistedState, ReadOutcome, Reconciler, ReconcilerBuilder, Timeouts,
};

use crate::cli::{Cli, Commands, EmulatorCommands};
use crate::config::FileConfig;
use crate::{emulator, state_file};

/// Execute a CLI command.
///
/// # Errors
///
/// Returns error if configuration, state or the reconciler operation fails.
pub async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::UpgradeState => cmd_upgrade_state(&cli.state),
        Commands::Emulator { command } => cmd_emulator(&cli.config, &cli.emulator, command).await,
        command => {
            let session = Session::open(&cli.config, &cli.emulator, cli.state)?;
            let result = session.execute(command).await;
            session.persist_emulator().await?;
            result
        }
    }
}

/// Everything a reconciler command needs.
struct Session {
    config: FileConfig,
    reconciler: Reconciler,
    plane: Arc<InMemoryControlPlane>,
    canceller: Arc<Canceller>,
    state_path: PathBuf,
    emulator_path: PathBuf,
}

impl Session {
    fn open(config_path: &Path, emulator_path: &Path, state_path: PathBuf) -> Result<Self> {
        let config = FileConfig::load(config_path)?;
        let plane = emulator::load(emulator_path)?;
        let reconciler = ReconcilerBuilder::new()
            .with_client(plane.clone())
            .with_config(config.reconciler_config())
            .build()
            .context("Failed to build reconciler")?;

        Ok(Self {
            config,
            reconciler,
            plane,
            canceller: cancel_on_ctrl_c(),
            state_path,
            emulator_path: emulator_path.to_path_buf(),
        })
    }

    async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Create => self.cmd_create().await,
            Commands::Read => self.cmd_read().await,
            Commands::Update => self.cmd_update().await,
            Commands::Delete => self.cmd_delete().await,
            Commands::Import { id } => self.cmd_import(&id).await,
            Commands::MigrateCapacity { to } => self.cmd_migrate_capacity(to).await,
            Commands::UpgradeState | Commands::Emulator { .. } => {
                bail!("command does not run against the control plane")
            }
        }
    }

    async fn cmd_create(&self) -> Result<()> {
        self.ensure_no_state()?;
        let desired = self.config.desired()?;
        let state = self
            .reconciler
            .create(&desired, &self.context(Timeouts::create))
            .await?;
        self.store(&state)
    }

    async fn cmd_read(&self) -> Result<()> {
        let prior = self.require_state()?;
        match self
            .reconciler
            .read(&prior.id, &self.context(Timeouts::read))
            .await?
        {
            ReadOutcome::Present(state) => self.store(&state),
            ReadOutcome::Absent => {
                state_file::clear(&self.state_path)?;
                println!("{} no longer exists; state cleared", prior.id);
                Ok(())
            }
        }
    }

    async fn cmd_update(&self) -> Result<()> {
        let prior = self.require_state()?;
        let desired = self.config.desired()?;
        let state = self
            .reconciler
            .update(&prior, &desired, &self.context(Timeouts::update))
            .await?;
        self.store(&state)
    }

    async fn cmd_delete(&self) -> Result<()> {
        let prior = self.require_state()?;
        self.reconciler
            .delete(&prior.id, &self.context(Timeouts::delete))
            .await?;
        state_file::clear(&self.state_path)?;
        println!("{} deleted", prior.id);
        Ok(())
    }

    async fn cmd_import(&self, id: &str) -> Result<()> {
        self.ensure_no_state()?;
        let state = self
            .reconciler
            .import(id, &self.context(Timeouts::read))
            .await?;
        self.store(&state)
    }

    async fn cmd_migrate_capacity(&self, to: CapacityMode) -> Result<()> {
        let prior = self.require_state()?;
        let state = self
            .reconciler
            .migrate_capacity(&prior.id, to, &self.context(Timeouts::update))
            .await?;
        self.store(&state)
    }

    fn context(&self, deadline: fn(&Timeouts) -> Duration) -> OperationContext {
        self.canceller
            .context(deadline(&self.reconciler.config().timeouts))
    }

    fn require_state(&self) -> Result<PersistedState> {
        state_file::load(&self.state_path)?.with_context(|| {
            format!(
                "No state at {}; create or import the database first",
                self.state_path.display()
            )
        })
    }

    fn ensure_no_state(&self) -> Result<()> {
        if let Some(existing) = state_file::load(&self.state_path)? {
            bail!(
                "State at {} already tracks {}; delete it before creating or importing another database",
                self.state_path.display(),
                existing.id
            );
        }
        Ok(())
    }

    fn store(&self, state: &PersistedState) -> Result<()> {
        state_file::save(&self.state_path, state)?;
        println!(
            "{}",
            serde_json::to_string_pretty(state).context("Failed to render state")?
        );
        Ok(())
    }

    async fn persist_emulator(&self) -> Result<()> {
        emulator::save(&self.emulator_path, &self.plane).await
    }
}

fn cmd_upgrade_state(state_path: &Path) -> Result<()> {
    let Some(state) = state_file::load(state_path)? else {
        bail!("No state at {}", state_path.display());
    };
    state_file::save(state_path, &state)?;
    info!(id = %state.id, "State file is at the current schema version");
    Ok(())
}

async fn cmd_emulator(
    config_path: &Path,
    emulator_path: &Path,
    command: EmulatorCommands,
) -> Result<()> {
    match command {
        EmulatorCommands::AddAccount {
            resource_group,
            name,
            serverless,
        } => {
            let config = FileConfig::load(config_path)?;
            let plane = emulator::load(emulator_path)?;
            let id = DatabaseAccountId::new(
                config.provider.subscription_id,
                resource_group,
                name,
            );
            let entry = if serverless {
                AccountEntry::serverless()
            } else {
                AccountEntry::provisioned()
            };
            plane.add_account(&id, entry).await;
            emulator::save(emulator_path, &plane).await?;
            info!(account = %id, serverless, "Added emulated account");
            Ok(())
        }
    }
}

/// Canceller that fires on Ctrl+C.
fn cancel_on_ctrl_c() -> Arc<Canceller> {
    let canceller = Arc::new(Canceller::new());
    let handle = Arc::clone(&canceller);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl+C, cancelling in-flight operation");
                handle.cancel();
            }
            Err(err) => error!("Failed to listen for Ctrl+C: {}", err),
        }
    });
    canceller
}
