//! Runtime equivalence for toolchain packages.
//!
//! A requirement on `openjdk-<N>-jre` or `openjdk-<N>-jdk` (optionally
//! `-headless`) is also satisfied by any Java runtime or compiler on `PATH`
//! whose version is at least `N`, however it was installed. The version is
//! probed at most once per flavor for the lifetime of a resolver.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use tracing::debug;

use crate::shell::execute_quiet;

use super::probe::{parse_system_path, resolve_tool_path};
use super::spec::PackageRef;

static OPENJDK_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^openjdk-(\d+)-(jre|jdk)(?:-headless)?$").expect("openjdk pattern must compile")
});

static JAVA_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"version "(\d+(?:\.\d+)*)"#).expect("java version pattern must compile")
});

static JAVAC_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"javac (\d+(?:\.\d+)*)").expect("javac version pattern must compile")
});

/// Numeric version, compared component by component.
pub type Version = Vec<u64>;

/// Parse `17.0.2` into `[17, 0, 2]`.
pub fn parse_version(raw: &str) -> Option<Version> {
    raw.split('.').map(|part| part.parse().ok()).collect()
}

/// Which Java binary stands in for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFlavor {
    /// Runtime only; probed with `java -version`.
    Jre,
    /// Compiler; probed with `javac -version`.
    Jdk,
}

impl RuntimeFlavor {
    /// Binary probed for this flavor.
    pub fn binary(&self) -> &'static str {
        match self {
            RuntimeFlavor::Jre => "java",
            RuntimeFlavor::Jdk => "javac",
        }
    }

    /// Extract the version from the binary's `-version` output.
    pub fn parse_output(&self, output: &str) -> Option<Version> {
        let pattern = match self {
            RuntimeFlavor::Jre => &*JAVA_VERSION,
            RuntimeFlavor::Jdk => &*JAVAC_VERSION,
        };
        let captures = pattern.captures(output)?;
        parse_version(captures.get(1)?.as_str())
    }
}

impl fmt::Display for RuntimeFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeFlavor::Jre => write!(f, "jre"),
            RuntimeFlavor::Jdk => write!(f, "jdk"),
        }
    }
}

/// A package requirement that a locally installed runtime can satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquivalenceRule {
    /// Required major version.
    pub major: u64,
    pub flavor: RuntimeFlavor,
}

impl EquivalenceRule {
    /// The rule for a package, if its name follows the openjdk scheme.
    pub fn for_package(pkg: &PackageRef) -> Option<Self> {
        let captures = OPENJDK_PACKAGE.captures(&pkg.name)?;
        let major = captures.get(1)?.as_str().parse().ok()?;
        let flavor = match captures.get(2)?.as_str() {
            "jre" => RuntimeFlavor::Jre,
            _ => RuntimeFlavor::Jdk,
        };
        Some(Self { major, flavor })
    }

    /// Whether `installed` meets the required major version.
    pub fn accepts(&self, installed: &[u64]) -> bool {
        installed >= [self.major].as_slice()
    }
}

/// Source of installed runtime versions.
pub trait VersionProbe: Send + Sync {
    /// The installed version for a flavor, or `None` if it's missing or
    /// unreadable.
    fn probe(&self, flavor: RuntimeFlavor) -> Option<Version>;
}

/// Probes the real `java`/`javac` binaries found on `PATH`.
#[derive(Debug, Clone)]
pub struct BinaryVersionProbe {
    path_entries: Vec<PathBuf>,
}

impl BinaryVersionProbe {
    /// Probe using the process `PATH`.
    pub fn from_env() -> Self {
        Self::with_path(parse_system_path())
    }

    /// Probe using explicit search directories.
    pub fn with_path(path_entries: Vec<PathBuf>) -> Self {
        Self { path_entries }
    }
}

impl VersionProbe for BinaryVersionProbe {
    fn probe(&self, flavor: RuntimeFlavor) -> Option<Version> {
        let Some(binary) = resolve_tool_path(flavor.binary(), &self.path_entries) else {
            debug!("Missing {} command: considering it not installed", flavor.binary());
            return None;
        };

        // Older releases print the version on stderr, newer ones on stdout.
        let result = execute_quiet(&binary, &["-version"]).ok()?;
        let version = flavor.parse_output(&result.combined_output());
        debug!("{} reports version {:?}", binary.display(), version);
        version
    }
}

/// Answers equivalence rules, caching one probe per flavor.
pub struct EquivalenceResolver {
    probe: Box<dyn VersionProbe>,
    probed: Mutex<HashMap<RuntimeFlavor, Option<Version>>>,
}

impl EquivalenceResolver {
    pub fn new(probe: Box<dyn VersionProbe>) -> Self {
        Self {
            probe,
            probed: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver probing the binaries on the process `PATH`.
    pub fn from_env() -> Self {
        Self::new(Box::new(BinaryVersionProbe::from_env()))
    }

    /// The equivalence rule that applies to a package, if any.
    pub fn rule_for(&self, pkg: &PackageRef) -> Option<EquivalenceRule> {
        EquivalenceRule::for_package(pkg)
    }

    /// Installed version for a flavor, probing it on first use.
    pub fn installed_version(&self, flavor: RuntimeFlavor) -> Option<Version> {
        let mut probed = self.probed.lock().unwrap_or_else(|e| e.into_inner());
        probed
            .entry(flavor)
            .or_insert_with(|| self.probe.probe(flavor))
            .clone()
    }

    /// Whether a locally installed runtime satisfies the rule.
    pub fn is_satisfied(&self, rule: &EquivalenceRule) -> bool {
        let satisfied = self
            .installed_version(rule.flavor)
            .is_some_and(|version| rule.accepts(&version));
        if satisfied {
            debug!(
                "Java {} {} already available, not requiring openjdk",
                rule.flavor, rule.major
            );
        }
        satisfied
    }

    /// Whether a package is stood in for by a local runtime.
    pub fn satisfies(&self, pkg: &PackageRef) -> bool {
        self.rule_for(pkg).is_some_and(|rule| self.is_satisfied(&rule))
    }
}

impl fmt::Debug for EquivalenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EquivalenceResolver")
            .field("probed", &self.probed)
            .finish_non_exhaustive()
    }
}

/// Fixed versions, for tests and for hosts without Java.
#[derive(Debug, Clone, Default)]
pub struct StaticVersionProbe {
    versions: HashMap<RuntimeFlavor, Version>,
    calls: Arc<AtomicUsize>,
}

impl StaticVersionProbe {
    /// A probe that finds nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Report `version` for `flavor`.
    pub fn with(mut self, flavor: RuntimeFlavor, version: &str) -> Self {
        if let Some(parsed) = parse_version(version) {
            self.versions.insert(flavor, parsed);
        }
        self
    }

    /// Shared counter of `probe` calls.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl VersionProbe for StaticVersionProbe {
    fn probe(&self, flavor: RuntimeFlavor) -> Option<Version> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.versions.get(&flavor).cloned()
    }
}
