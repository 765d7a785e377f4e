//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// umake - package requirements for developer frameworks.
#[derive(Debug, Parser)]
#[command(name = "umake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to an extra config file, merged over the user config
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report whether packages are installed, available and up to date
    Check(CheckArgs),

    /// Install or upgrade packages
    Install(InstallArgs),

    /// Perform package database changes with elevated privileges
    #[command(hide = true)]
    PrivilegedHelper(HelperArgs),
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CheckArgs {
    /// Package specifiers (`name`, `name:arch` or `a | b`)
    #[arg(required = true, value_name = "SPECIFIER")]
    pub packages: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `install` command.
#[derive(Debug, Clone, clap::Args)]
pub struct InstallArgs {
    /// Package specifiers (`name`, `name:arch` or `a | b`)
    #[arg(required = true, value_name = "SPECIFIER")]
    pub packages: Vec<String>,
}

/// Arguments for the hidden `privileged-helper` command.
#[derive(Debug, Clone, clap::Args)]
pub struct HelperArgs {
    /// apt-get to run instead of /usr/bin/apt-get (refused as root)
    #[arg(long, hide = true, value_name = "PATH")]
    pub apt_get: Option<PathBuf>,

    #[command(subcommand)]
    pub action: HelperAction,
}

/// What the privileged helper should do.
#[derive(Debug, Clone, Subcommand)]
pub enum HelperAction {
    /// Enable a foreign architecture and refresh package lists
    AddArch {
        /// Architecture name, e.g. `i386`
        arch: String,
    },

    /// Install and upgrade packages
    Commit {
        /// Package to install
        #[arg(long = "install", value_name = "PACKAGE")]
        install: Vec<String>,

        /// Package to upgrade
        #[arg(long = "upgrade", value_name = "PACKAGE")]
        upgrade: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_with_alternation() {
        let cli = Cli::parse_from(["umake", "check", "gcc-avr", "openjdk-8-jdk | openjdk-11-jdk", "--json"]);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.packages, vec!["gcc-avr", "openjdk-8-jdk | openjdk-11-jdk"]);
                assert!(args.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn install_requires_packages() {
        assert!(Cli::try_parse_from(["umake", "install"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["umake", "install", "make", "--debug", "-q", "--config", "x.yml"]);
        assert!(cli.debug);
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("x.yml")));
    }

    #[test]
    fn parses_helper_commit() {
        let cli = Cli::parse_from([
            "umake",
            "privileged-helper",
            "commit",
            "--install",
            "gcc-avr",
            "--upgrade",
            "make",
            "--install",
            "libncurses5:i386",
        ]);
        let Commands::PrivilegedHelper(args) = cli.command else {
            panic!("expected privileged-helper");
        };
        assert_eq!(args.apt_get, None);
        match args.action {
            HelperAction::Commit { install, upgrade } => {
                assert_eq!(install, vec!["gcc-avr", "libncurses5:i386"]);
                assert_eq!(upgrade, vec!["make"]);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn parses_helper_apt_get_replacement() {
        let cli = Cli::parse_from([
            "umake",
            "privileged-helper",
            "--apt-get",
            "/tmp/fake-apt-get",
            "add-arch",
            "i386",
        ]);
        let Commands::PrivilegedHelper(args) = cli.command else {
            panic!("expected privileged-helper");
        };
        assert_eq!(args.apt_get, Some(PathBuf::from("/tmp/fake-apt-get")));
        assert!(matches!(args.action, HelperAction::AddArch { arch } if arch == "i386"));
    }
}
