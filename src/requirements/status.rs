//! Per-package status derived from the package database.
//!
//! A `PackageStatus` is computed on demand from a cache snapshot for one
//! evaluation and then thrown away; nothing here is cached.

use std::collections::HashMap;

use super::spec::PackageRef;

/// What the package database knows about one package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackageRecord {
    /// Package is currently installed.
    pub installed: bool,
    /// A newer candidate version is available.
    pub upgradable: bool,
}

/// Status of a single package as seen by one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackageStatus {
    /// Package is known to the database.
    pub present: bool,
    /// Package is installed.
    pub installed: bool,
    /// Package is installed and has a newer candidate.
    pub upgradable: bool,
}

impl PackageStatus {
    /// Status for a package the database has never heard of.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Whether the package counts as installed.
    ///
    /// "Not present" and "present but not installed" are treated the same.
    pub fn is_installed(&self) -> bool {
        self.present && self.installed
    }

    /// Whether the package is installed with no pending upgrade.
    pub fn is_up_to_date(&self) -> bool {
        self.is_installed() && !self.upgradable
    }
}

impl From<Option<&PackageRecord>> for PackageStatus {
    fn from(record: Option<&PackageRecord>) -> Self {
        match record {
            Some(record) => Self {
                present: true,
                installed: record.installed,
                upgradable: record.installed && record.upgradable,
            },
            None => Self::absent(),
        }
    }
}

/// Point-in-time view of the package database.
///
/// Packages are keyed by bare name for native (and `all`) architecture
/// packages and by `name:arch` for foreign ones, which is how dpkg names
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    native_arch: String,
    foreign_archs: Vec<String>,
    packages: HashMap<String, PackageRecord>,
}

impl CacheSnapshot {
    /// Create an empty snapshot for a host architecture.
    pub fn new(native_arch: &str) -> Self {
        Self {
            native_arch: native_arch.to_string(),
            ..Default::default()
        }
    }

    /// Record an enabled foreign architecture.
    pub fn add_foreign_arch(&mut self, arch: &str) {
        if arch != self.native_arch && !self.foreign_archs.iter().any(|a| a == arch) {
            self.foreign_archs.push(arch.to_string());
        }
    }

    /// Record a package under its database key.
    pub fn insert(&mut self, key: &str, record: PackageRecord) {
        self.packages.insert(key.to_string(), record);
    }

    /// The host architecture.
    pub fn native_arch(&self) -> &str {
        &self.native_arch
    }

    /// Enabled foreign architectures.
    pub fn foreign_archs(&self) -> &[String] {
        &self.foreign_archs
    }

    /// Whether `arch` is the host arch or an enabled foreign arch.
    pub fn is_arch_enabled(&self, arch: &str) -> bool {
        arch == self.native_arch || self.foreign_archs.iter().any(|a| a == arch)
    }

    /// Number of packages known to the database.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the snapshot has no packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Database key for a package reference.
    pub fn key_for(&self, pkg: &PackageRef) -> String {
        pkg.normalized(&self.native_arch).to_string()
    }

    /// Whether the package is known to the database.
    pub fn contains(&self, pkg: &PackageRef) -> bool {
        self.packages.contains_key(&self.key_for(pkg))
    }

    /// Derive the status of a package.
    pub fn status(&self, pkg: &PackageRef) -> PackageStatus {
        PackageStatus::from(self.packages.get(&self.key_for(pkg)))
    }
}
