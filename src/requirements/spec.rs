//! Package specifiers and buckets.
//!
//! A bucket is the ordered list of system packages some tool needs. Each
//! entry is a [`Specifier`]: a bare package name (`gcc-avr`), an
//! arch-qualified name (`libc6:i386`), or an alternation
//! (`openjdk-17-jdk | openjdk-21-jdk`) where any one alternative suffices.
//!
//! # Example
//!
//! ```
//! use umake::requirements::spec::Bucket;
//!
//! let bucket = Bucket::parse(["gcc-avr", "libc6:i386", "a | b"]).unwrap();
//! assert_eq!(bucket.len(), 3);
//! assert!(!bucket.is_resolved());
//! assert_eq!(bucket.to_strings(), vec!["gcc-avr", "libc6:i386", "a | b"]);
//! ```

use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::error::{Result, UmakeError};

/// A single package, optionally qualified with a target architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRef {
    /// Package name as known to the package database.
    pub name: String,
    /// Target architecture (`name:arch`), if given.
    pub arch: Option<String>,
}

impl PackageRef {
    /// Parse `name` or `name:arch`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = |message: &str| UmakeError::InvalidSpecifier {
            spec: raw.to_string(),
            message: message.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("empty package name"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(invalid("package names can't contain whitespace"));
        }

        match raw.rsplit_once(':') {
            Some((name, arch)) => {
                if name.is_empty() || arch.is_empty() {
                    return Err(invalid("expected 'name:arch'"));
                }
                Ok(Self {
                    name: name.to_string(),
                    arch: Some(arch.to_string()),
                })
            }
            None => Ok(Self {
                name: raw.to_string(),
                arch: None,
            }),
        }
    }

    /// Create an unqualified package reference.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arch: None,
        }
    }

    /// Drop the arch qualifier when it names the host architecture.
    ///
    /// dpkg doesn't track a native-arch qualifier, so `foo:amd64` on an
    /// amd64 host must be looked up as `foo`.
    pub fn normalized(&self, native_arch: &str) -> Self {
        match &self.arch {
            Some(arch) if arch == native_arch => Self::named(&self.name),
            _ => self.clone(),
        }
    }

    /// The arch qualifier, if it names something other than the host arch.
    pub fn foreign_arch(&self, native_arch: &str) -> Option<&str> {
        self.arch.as_deref().filter(|arch| *arch != native_arch)
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arch {
            Some(arch) => write!(f, "{}:{}", self.name, arch),
            None => write!(f, "{}", self.name),
        }
    }
}

/// One entry of a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// A concrete package.
    Package(PackageRef),
    /// Any one of these packages satisfies the requirement.
    Alternatives(Vec<PackageRef>),
}

impl Specifier {
    /// Parse a specifier string. Alternatives are separated by `|`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut choices = raw
            .split('|')
            .map(PackageRef::parse)
            .collect::<Result<Vec<_>>>()?;

        if choices.len() == 1 {
            Ok(Specifier::Package(choices.remove(0)))
        } else {
            Ok(Specifier::Alternatives(choices))
        }
    }

    /// The concrete package, if this specifier isn't an alternation.
    pub fn as_package(&self) -> Option<&PackageRef> {
        match self {
            Specifier::Package(pkg) => Some(pkg),
            Specifier::Alternatives(_) => None,
        }
    }

    /// Whether this specifier still needs a choice to be made.
    pub fn is_alternation(&self) -> bool {
        matches!(self, Specifier::Alternatives(_))
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specifier::Package(pkg) => write!(f, "{}", pkg),
            Specifier::Alternatives(choices) => {
                let parts: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" | "))
            }
        }
    }
}

/// Ordered set of specifiers required for some feature to work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    specifiers: Vec<Specifier>,
}

impl Bucket {
    /// Build a bucket from already-parsed specifiers.
    pub fn new(specifiers: Vec<Specifier>) -> Self {
        Self { specifiers }
    }

    /// Parse a bucket from specifier strings.
    pub fn parse<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let specifiers = raw
            .into_iter()
            .map(|s| Specifier::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { specifiers })
    }

    /// The specifiers in order.
    pub fn specifiers(&self) -> &[Specifier] {
        &self.specifiers
    }

    /// Iterate over the specifiers.
    pub fn iter(&self) -> std::slice::Iter<'_, Specifier> {
        self.specifiers.iter()
    }

    /// Number of specifiers.
    pub fn len(&self) -> usize {
        self.specifiers.len()
    }

    /// Whether the bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    /// Whether every alternation has been resolved to a single package.
    pub fn is_resolved(&self) -> bool {
        !self.specifiers.iter().any(Specifier::is_alternation)
    }

    /// Replace the specifier at `index` with the chosen alternative.
    pub(crate) fn resolve_at(&mut self, index: usize, choice: PackageRef) {
        if let Some(slot) = self.specifiers.get_mut(index) {
            *slot = Specifier::Package(choice);
        }
    }

    /// Render every specifier back to its string form.
    pub fn to_strings(&self) -> Vec<String> {
        self.specifiers.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.to_strings().join(", "))
    }
}

impl<'a> IntoIterator for &'a Bucket {
    type Item = &'a Specifier;
    type IntoIter = std::slice::Iter<'a, Specifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.specifiers.iter()
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.specifiers.len()))?;
        for spec in &self.specifiers {
            seq.serialize_element(&spec.to_string())?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name() {
        let pkg = PackageRef::parse("gcc-avr").unwrap();
        assert_eq!(pkg.name, "gcc-avr");
        assert!(pkg.arch.is_none());
    }

    #[test]
    fn parses_arch_qualified_name() {
        let pkg = PackageRef::parse("libc6:i386").unwrap();
        assert_eq!(pkg.name, "libc6");
        assert_eq!(pkg.arch.as_deref(), Some("i386"));
        assert_eq!(pkg.to_string(), "libc6:i386");
    }

    #[test]
    fn rejects_empty_and_malformed_names() {
        assert!(PackageRef::parse("").is_err());
        assert!(PackageRef::parse("  ").is_err());
        assert!(PackageRef::parse("libc6:").is_err());
        assert!(PackageRef::parse(":i386").is_err());
        assert!(PackageRef::parse("two words").is_err());
    }

    #[test]
    fn normalizes_native_arch_only() {
        let native = PackageRef::parse("libc6:amd64").unwrap();
        assert_eq!(native.normalized("amd64"), PackageRef::named("libc6"));

        let foreign = PackageRef::parse("libc6:arm64").unwrap();
        assert_eq!(foreign.normalized("amd64"), foreign);
        assert_eq!(foreign.foreign_arch("amd64"), Some("arm64"));
        assert_eq!(native.foreign_arch("amd64"), None);
    }

    #[test]
    fn parses_alternation() {
        let spec = Specifier::parse("openjdk-17-jdk | openjdk-21-jdk").unwrap();
        match &spec {
            Specifier::Alternatives(choices) => {
                assert_eq!(choices.len(), 2);
                assert_eq!(choices[0].name, "openjdk-17-jdk");
                assert_eq!(choices[1].name, "openjdk-21-jdk");
            }
            Specifier::Package(_) => panic!("Expected alternatives"),
        }
        assert_eq!(spec.to_string(), "openjdk-17-jdk | openjdk-21-jdk");
    }

    #[test]
    fn alternation_with_empty_branch_is_invalid() {
        assert!(Specifier::parse("a | ").is_err());
    }

    #[test]
    fn bucket_tracks_resolution() {
        let mut bucket = Bucket::parse(["x", "a | b"]).unwrap();
        assert!(!bucket.is_resolved());

        bucket.resolve_at(1, PackageRef::named("b"));
        assert!(bucket.is_resolved());
        assert_eq!(bucket.to_strings(), vec!["x", "b"]);
    }

    #[test]
    fn bucket_serializes_as_strings() {
        let bucket = Bucket::parse(["x:i386", "a | b"]).unwrap();
        let json = serde_json::to_string(&bucket).unwrap();
        assert_eq!(json, r#"["x:i386","a | b"]"#);
    }

    #[test]
    fn bucket_display_lists_specifiers() {
        let bucket = Bucket::parse(["gcc-avr", "avr-libc"]).unwrap();
        assert_eq!(bucket.to_string(), "[gcc-avr, avr-libc]");
    }
}
