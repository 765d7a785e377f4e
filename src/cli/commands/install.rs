//! Install command implementation.
//!
//! The `umake install` command queues a bucket on the requirements
//! service, draws its progress and waits for the result.

use std::sync::mpsc;

use crate::cli::args::InstallArgs;
use crate::error::{Result, UmakeError};
use crate::requirements::{Bucket, RequirementsService};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The install command implementation.
pub struct InstallCommand {
    args: InstallArgs,
    service: RequirementsService,
}

impl InstallCommand {
    pub fn new(args: InstallArgs, service: RequirementsService) -> Self {
        Self { args, service }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &InstallArgs {
        &self.args
    }
}

impl Command for InstallCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let bucket = Bucket::parse(&self.args.packages)?;
        let label = bucket.to_strings().join(", ");
        let mut progress = ui.start_progress(&label);

        let (tx, rx) = mpsc::channel();
        let needed = self.service.submit(bucket.clone(), progress.reporter(), move |result| {
            let _ = tx.send(result);
        });
        let result = rx.recv().map_err(|_| UmakeError::ServiceStopped)?;

        if result.bucket != bucket {
            ui.detail(&format!("{} resolved to {}", bucket, result.bucket));
        }
        if !needed {
            ui.detail("Package manager not needed");
        }

        match result.error {
            None if needed => {
                progress.finish_success(&format!("Installed {}", label));
                Ok(CommandResult::success())
            }
            None => {
                progress.finish_skipped(&format!("{} already installed and up to date", label));
                Ok(CommandResult::success())
            }
            Some(error) => {
                progress.finish_error(&format!("Failed to install {}", label));
                ui.error(&error);
                Ok(CommandResult::failure(1))
            }
        }
    }
}
