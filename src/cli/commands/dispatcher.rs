//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cli::args::{Cli, Commands};
use crate::config::{load_config, validate, RequirementsSettings};
use crate::error::Result;
use crate::requirements::apt::AptBackend;
use crate::requirements::{
    BucketEvaluator, EquivalenceResolver, PackageCache, RequirementsService,
};
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    config_path: Option<PathBuf>,
}

impl CommandDispatcher {
    /// Create a dispatcher reading the user config plus `config_path`.
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    /// The explicit config file, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Load and validate the requirements settings.
    pub fn settings(&self) -> Result<RequirementsSettings> {
        let config = load_config(self.config_path())?;
        validate(&config)?;
        debug!("Requirements settings: {:?}", config.requirements);
        Ok(config.requirements)
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        match &cli.command {
            Commands::Check(args) => {
                let evaluator = open_evaluator(&self.settings()?)?;
                let cmd = super::check::CheckCommand::new(args.clone(), evaluator);
                cmd.execute(ui)
            }
            Commands::Install(args) => {
                let service = RequirementsService::from_settings(&self.settings()?)?;
                let cmd = super::install::InstallCommand::new(args.clone(), service);
                cmd.execute(ui)
            }
            Commands::PrivilegedHelper(args) => {
                let cmd = super::helper::HelperCommand::new(args.clone());
                cmd.execute(ui)
            }
        }
    }
}

/// Read-only evaluator over the system package database.
fn open_evaluator(settings: &RequirementsSettings) -> Result<BucketEvaluator> {
    let backend = AptBackend::from_settings(settings)?;
    let cache = PackageCache::open(Arc::new(backend), settings.reload_retry.into())?;
    Ok(BucketEvaluator::new(
        Arc::new(cache),
        Arc::new(EquivalenceResolver::from_env()),
    ))
}
