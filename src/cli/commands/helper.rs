//! Privileged helper command implementation.
//!
//! `umake privileged-helper` is started by the install worker through the
//! elevation command. It speaks the helper protocol on stdout and sends
//! package tool output to stderr, which the worker points at the
//! exchange file.

use std::io;

use tracing::debug;

use crate::cli::args::{HelperAction, HelperArgs};
use crate::error::Result;
use crate::requirements::helper::{serve, HelperRequest, PackageTools};
use crate::shell::is_elevated;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The privileged-helper command implementation.
pub struct HelperCommand {
    args: HelperArgs,
}

impl HelperCommand {
    pub fn new(args: HelperArgs) -> Self {
        Self { args }
    }

    /// The package tools to run; a replacement apt-get is refused as root.
    pub fn tools(&self) -> Result<PackageTools> {
        PackageTools::resolve(self.args.apt_get.clone(), is_elevated())
    }

    /// The request these arguments describe.
    pub fn request(&self) -> HelperRequest {
        match &self.args.action {
            HelperAction::AddArch { arch } => HelperRequest::AddArch { arch: arch.clone() },
            HelperAction::Commit { install, upgrade } => HelperRequest::Commit {
                install: install.clone(),
                upgrade: upgrade.clone(),
            },
        }
    }
}

impl Command for HelperCommand {
    fn execute(&self, _ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let request = self.request();
        let tools = self.tools()?;
        debug!("Serving helper request {:?} with {:?}", request, tools);

        let mut out = io::stdout().lock();
        let mut log = io::stderr().lock();
        if serve(&request, &tools, &mut out, &mut log)? {
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_action_becomes_commit_request() {
        let cmd = HelperCommand::new(HelperArgs {
            apt_get: None,
            action: HelperAction::Commit {
                install: vec!["gcc-avr".to_string()],
                upgrade: vec!["make".to_string()],
            },
        });
        assert_eq!(
            cmd.request(),
            HelperRequest::Commit {
                install: vec!["gcc-avr".to_string()],
                upgrade: vec!["make".to_string()],
            }
        );
    }

    #[test]
    fn request_round_trips_through_helper_args() {
        let cmd = HelperCommand::new(HelperArgs {
            apt_get: None,
            action: HelperAction::AddArch {
                arch: "i386".to_string(),
            },
        });
        assert_eq!(cmd.request().to_args(), vec!["add-arch", "i386"]);
    }

    #[test]
    fn system_tools_unless_replaced() {
        let cmd = HelperCommand::new(HelperArgs {
            apt_get: None,
            action: HelperAction::AddArch {
                arch: "i386".to_string(),
            },
        });
        assert_eq!(cmd.tools().unwrap(), PackageTools::system());
    }

    #[test]
    fn replacement_apt_get_only_when_unprivileged() {
        let cmd = HelperCommand::new(HelperArgs {
            apt_get: Some("/tmp/fake-apt-get".into()),
            action: HelperAction::AddArch {
                arch: "i386".to_string(),
            },
        });
        match cmd.tools() {
            Ok(tools) => {
                assert!(!is_elevated());
                assert_eq!(tools.apt_get, std::path::PathBuf::from("/tmp/fake-apt-get"));
            }
            Err(err) => {
                assert!(is_elevated());
                assert!(matches!(err, crate::error::UmakeError::ToolOverrideRefused { .. }));
            }
        }
    }
}
