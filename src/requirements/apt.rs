//! dpkg/APT package backend.
//!
//! Reads need no privileges and go straight to `dpkg` and `apt list`.
//! Mutations are delegated to the privileged helper.

use std::path::Path;

use tracing::debug;

use crate::config::RequirementsSettings;
use crate::error::{Result, UmakeError};
use crate::shell::{execute_quiet, CommandResult};

use super::backend::{LoadError, MarkPlan, PackageBackend};
use super::helper::{HelperClient, HelperRequest};
use super::progress::CommitEvent;
use super::status::{CacheSnapshot, PackageRecord};

/// One parsed `apt list` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AptListEntry {
    pub name: String,
    pub arch: String,
    pub record: PackageRecord,
}

/// Parse a line such as `make/jammy,now 4.3-4.1build1 amd64 [installed]`.
///
/// Returns `None` for headers and warnings.
pub fn parse_apt_list_line(line: &str) -> Option<AptListEntry> {
    let (name, rest) = line.split_once('/')?;
    let mut fields = rest.split_whitespace();
    let _suites = fields.next()?;
    let _version = fields.next()?;
    let arch = fields.next()?;
    let flags = rest
        .split_once('[')
        .and_then(|(_, f)| f.strip_suffix(']'))
        .unwrap_or("");

    let upgradable = flags.contains("upgradable from");
    let installed = upgradable || flags.split(',').any(|f| f.trim() == "installed");

    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some(AptListEntry {
        name: name.to_string(),
        arch: arch.to_string(),
        record: PackageRecord {
            installed,
            upgradable,
        },
    })
}

fn load_error(result: &CommandResult, what: &str) -> LoadError {
    let output = result.combined_output();
    if output.contains("lock") {
        LoadError::Busy(output)
    } else {
        LoadError::Failed(format!("{} failed: {}", what, output))
    }
}

/// Package backend for Debian-based systems.
#[derive(Debug, Clone)]
pub struct AptBackend {
    dpkg: String,
    apt: String,
    helper: HelperClient,
}

impl AptBackend {
    pub fn new(helper: HelperClient) -> Self {
        Self {
            dpkg: "dpkg".to_string(),
            apt: "apt".to_string(),
            helper,
        }
    }

    /// Backend using the current executable as privileged helper.
    pub fn from_settings(settings: &RequirementsSettings) -> Result<Self> {
        let helper =
            HelperClient::for_current_exe(settings.elevation_command.clone())?;
        Ok(Self::new(helper))
    }

    /// Use other programs for the read-only queries.
    pub fn with_tools(mut self, dpkg: &str, apt: &str) -> Self {
        self.dpkg = dpkg.to_string();
        self.apt = apt.to_string();
        self
    }

    fn query(&self, program: &str, args: &[&str]) -> std::result::Result<String, LoadError> {
        let what = format!("{} {}", program, args.join(" "));
        let result =
            execute_quiet(program, args).map_err(|e| LoadError::Failed(e.to_string()))?;
        if result.success {
            Ok(result.stdout)
        } else {
            Err(load_error(&result, &what))
        }
    }
}

impl PackageBackend for AptBackend {
    fn load(&self) -> std::result::Result<CacheSnapshot, LoadError> {
        let native = self.query(&self.dpkg, &["--print-architecture"])?;
        let native = native.trim();
        if native.is_empty() {
            return Err(LoadError::Failed(
                "dpkg didn't report the host architecture".to_string(),
            ));
        }

        let mut snapshot = CacheSnapshot::new(native);
        for arch in self
            .query(&self.dpkg, &["--print-foreign-architectures"])?
            .split_whitespace()
        {
            snapshot.add_foreign_arch(arch);
        }

        let listing = self.query(&self.apt, &["list"])?;
        for entry in listing.lines().filter_map(parse_apt_list_line) {
            if entry.arch == native || entry.arch == "all" {
                snapshot.insert(&entry.name, entry.record);
            } else {
                snapshot.insert(&format!("{}:{}", entry.name, entry.arch), entry.record);
            }
        }

        debug!(
            "Read {} packages (native {}, foreign {:?})",
            snapshot.len(),
            snapshot.native_arch(),
            snapshot.foreign_archs()
        );
        Ok(snapshot)
    }

    fn enable_foreign_arch(&self, arch: &str, exchange: &Path) -> Result<()> {
        let request = HelperRequest::AddArch {
            arch: arch.to_string(),
        };
        self.helper
            .run(&request, exchange, &mut |_| {})
            .map_err(|e| match e {
                UmakeError::CommitFailed { message } => UmakeError::ForeignArchFailed {
                    arch: arch.to_string(),
                    message,
                },
                other => other,
            })
    }

    fn commit(
        &self,
        plan: &MarkPlan,
        exchange: &Path,
        on_event: &mut dyn FnMut(CommitEvent),
    ) -> Result<()> {
        self.helper
            .run(&HelperRequest::commit(plan), exchange, on_event)
    }
}
