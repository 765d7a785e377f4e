//! Bucket evaluation against the package database.
//!
//! The three checks share the same shape: every specifier of the bucket is
//! tested against the current cache snapshot, alternations are resolved to
//! the alternative the check settled on, and the resolved bucket is handed
//! back together with the verdict. Every specifier is visited even after
//! one fails, so a single pass resolves every alternation it can.
//!
//! Packages covered by an [`EquivalenceRule`](super::equivalence::EquivalenceRule)
//! are satisfied either by the package database or by a local runtime of
//! a recent enough version.

use std::sync::Arc;

use tracing::{debug, info};

use super::cache::PackageCache;
use super::equivalence::EquivalenceResolver;
use super::spec::{Bucket, PackageRef, Specifier};
use super::status::CacheSnapshot;

/// Outcome of evaluating a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// The bucket with every decidable alternation resolved.
    pub bucket: Bucket,
    /// Whether every specifier passed the check.
    pub satisfied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Installed,
    Available,
    UpToDate,
}

/// Decides installed / available / up-to-date status of buckets.
#[derive(Clone)]
pub struct BucketEvaluator {
    cache: Arc<PackageCache>,
    equivalence: Arc<EquivalenceResolver>,
}

impl BucketEvaluator {
    pub fn new(cache: Arc<PackageCache>, equivalence: Arc<EquivalenceResolver>) -> Self {
        Self { cache, equivalence }
    }

    /// The cache this evaluator reads.
    pub fn cache(&self) -> &Arc<PackageCache> {
        &self.cache
    }

    /// The resolver consulted for runtime equivalences.
    pub fn equivalence(&self) -> &Arc<EquivalenceResolver> {
        &self.equivalence
    }

    /// Whether every specifier is installed.
    ///
    /// Alternations resolve to their first installed alternative.
    pub fn is_installed(&self, bucket: &Bucket) -> Evaluation {
        debug!("Check if {} is installed", bucket);
        self.evaluate(bucket, Check::Installed)
    }

    /// Whether every specifier could be installed on this host.
    ///
    /// Alternations resolve to their first available alternative. A package
    /// for a foreign architecture that isn't enabled yet counts as
    /// available, since enabling the architecture may provide it.
    pub fn is_available(&self, bucket: &Bucket) -> Evaluation {
        self.evaluate(bucket, Check::Available)
    }

    /// Whether every specifier is installed with no pending upgrade.
    ///
    /// Alternations resolve to their first installed alternative, else to
    /// the first available one, which is what an install would pick.
    pub fn is_up_to_date(&self, bucket: &Bucket) -> Evaluation {
        debug!("Check if {} is up to date", bucket);
        self.evaluate(bucket, Check::UpToDate)
    }

    fn evaluate(&self, bucket: &Bucket, check: Check) -> Evaluation {
        let snapshot = self.cache.snapshot();
        let mut resolved = bucket.clone();
        let mut satisfied = true;

        for (index, specifier) in bucket.iter().enumerate() {
            let pkg = match specifier {
                Specifier::Package(pkg) => pkg.clone(),
                Specifier::Alternatives(choices) => match self.choose(&snapshot, choices, check) {
                    Some(choice) => {
                        debug!("Resolved '{}' to {}", specifier, choice);
                        resolved.resolve_at(index, choice.clone());
                        choice
                    }
                    None => {
                        info!("No alternative of '{}' is usable", specifier);
                        satisfied = false;
                        continue;
                    }
                },
            };

            if !self.passes(&snapshot, &pkg, check) {
                satisfied = false;
            }
        }

        Evaluation {
            bucket: resolved,
            satisfied,
        }
    }

    fn choose(
        &self,
        snapshot: &CacheSnapshot,
        choices: &[PackageRef],
        check: Check,
    ) -> Option<PackageRef> {
        let first = |check: Check| {
            choices
                .iter()
                .find(|pkg| self.passes(snapshot, pkg, check))
                .cloned()
        };

        match check {
            Check::Installed => first(Check::Installed),
            Check::Available => first(Check::Available),
            Check::UpToDate => first(Check::Installed).or_else(|| first(Check::Available)),
        }
    }

    fn passes(&self, snapshot: &CacheSnapshot, pkg: &PackageRef, check: Check) -> bool {
        if self.equivalence.satisfies(pkg) {
            return true;
        }

        let status = snapshot.status(pkg);
        match check {
            Check::Installed => {
                if !status.is_installed() {
                    info!("{} isn't installed", pkg);
                }
                status.is_installed()
            }
            Check::UpToDate => {
                if !status.is_installed() {
                    info!("{} isn't installed", pkg);
                } else if status.upgradable {
                    info!("We can update {}", pkg);
                }
                status.is_up_to_date()
            }
            Check::Available => {
                if status.present {
                    return true;
                }
                match pkg.foreign_arch(snapshot.native_arch()) {
                    Some(arch) if !snapshot.is_arch_enabled(arch) => {
                        info!(
                            "{} isn't available on this platform, but {} isn't enabled. So it may be available later on",
                            pkg, arch
                        );
                        true
                    }
                    _ => {
                        info!("{} isn't available on this platform", pkg);
                        false
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::cache::RetryPolicy;
    use crate::requirements::equivalence::{RuntimeFlavor, StaticVersionProbe};
    use crate::requirements::mock::MockBackend;

    fn evaluator_with(backend: MockBackend, probe: StaticVersionProbe) -> BucketEvaluator {
        let cache = PackageCache::open(Arc::new(backend), RetryPolicy::default()).unwrap();
        BucketEvaluator::new(
            Arc::new(cache),
            Arc::new(EquivalenceResolver::new(Box::new(probe))),
        )
    }

    fn evaluator(backend: MockBackend) -> BucketEvaluator {
        evaluator_with(backend, StaticVersionProbe::none())
    }

    fn bucket(specs: &[&str]) -> Bucket {
        Bucket::parse(specs).unwrap()
    }

    #[test]
    fn installed_and_current_bucket_is_up_to_date() {
        let backend = MockBackend::new("amd64");
        backend.add_installed("gcc-avr");
        backend.add_installed("avr-libc");
        let eval = evaluator(backend);

        let b = bucket(&["gcc-avr", "avr-libc"]);
        assert!(eval.is_installed(&b).satisfied);
        assert!(eval.is_available(&b).satisfied);
        assert!(eval.is_up_to_date(&b).satisfied);
    }

    #[test]
    fn absent_and_uninstalled_are_both_unsatisfied() {
        let backend = MockBackend::new("amd64");
        backend.add_available("gcc-avr");
        let eval = evaluator(backend);

        assert!(!eval.is_installed(&bucket(&["gcc-avr"])).satisfied);
        assert!(!eval.is_installed(&bucket(&["nope"])).satisfied);
        assert!(!eval.is_up_to_date(&bucket(&["gcc-avr"])).satisfied);
        assert!(!eval.is_up_to_date(&bucket(&["nope"])).satisfied);
        assert!(eval.is_available(&bucket(&["gcc-avr"])).satisfied);
        assert!(!eval.is_available(&bucket(&["nope"])).satisfied);
    }

    #[test]
    fn upgradable_package_is_installed_but_not_up_to_date() {
        let backend = MockBackend::new("amd64");
        backend.add_upgradable("make");
        let eval = evaluator(backend);

        let b = bucket(&["make"]);
        assert!(eval.is_installed(&b).satisfied);
        assert!(!eval.is_up_to_date(&b).satisfied);
    }

    #[test]
    fn alternation_resolves_to_installed_choice() {
        let backend = MockBackend::new("amd64");
        backend.add_available("a");
        backend.add_installed("b");
        let eval = evaluator(backend);

        let first = eval.is_installed(&bucket(&["a | b"]));
        assert!(first.satisfied);
        assert_eq!(first.bucket, bucket(&["b"]));
        assert!(first.bucket.is_resolved());

        let second = eval.is_installed(&first.bucket);
        assert_eq!(second, first);
    }

    #[test]
    fn caller_bucket_is_left_untouched() {
        let backend = MockBackend::new("amd64");
        backend.add_installed("b");
        let eval = evaluator(backend);

        let original = bucket(&["a | b"]);
        let _ = eval.is_installed(&original);
        assert_eq!(original.to_strings(), vec!["a | b"]);
    }

    #[test]
    fn up_to_date_prefers_installed_then_available_alternative() {
        let backend = MockBackend::new("amd64");
        backend.add_available("openjfx");
        backend.add_available("libopenjfx-java");
        backend.add_upgradable("libopenjfx-jni");
        let eval = evaluator(backend);

        let b = bucket(&["openjfx | libopenjfx-jni", "missing | libopenjfx-java"]);
        let result = eval.is_up_to_date(&b);
        assert!(!result.satisfied);
        assert_eq!(
            result.bucket.to_strings(),
            vec!["libopenjfx-jni", "libopenjfx-java"]
        );
    }

    #[test]
    fn unusable_alternation_stays_unresolved() {
        let eval = evaluator(MockBackend::new("amd64"));

        let result = eval.is_available(&bucket(&["x | y"]));
        assert!(!result.satisfied);
        assert!(!result.bucket.is_resolved());
    }

    #[test]
    fn native_arch_qualifier_is_ignored() {
        let backend = MockBackend::new("amd64");
        backend.add_installed("libc6");
        let eval = evaluator(backend);

        let qualified = eval.is_up_to_date(&bucket(&["libc6:amd64"]));
        let bare = eval.is_up_to_date(&bucket(&["libc6"]));
        assert_eq!(qualified.satisfied, bare.satisfied);
        assert!(qualified.satisfied);
        assert!(eval.is_available(&bucket(&["libc6:amd64"])).satisfied);
    }

    #[test]
    fn disabled_foreign_arch_may_be_available_later() {
        let eval = evaluator(MockBackend::new("amd64"));

        let b = bucket(&["x:arm64"]);
        assert!(eval.is_available(&b).satisfied);
        assert!(!eval.is_installed(&b).satisfied);
        assert!(!eval.is_up_to_date(&b).satisfied);
    }

    #[test]
    fn enabled_foreign_arch_must_have_the_package() {
        let backend = MockBackend::new("amd64");
        backend.add_foreign_arch("i386");
        backend.add_available("libncurses5:i386");
        let eval = evaluator(backend);

        assert!(eval.is_available(&bucket(&["libncurses5:i386"])).satisfied);
        assert!(!eval.is_available(&bucket(&["missing:i386"])).satisfied);
    }

    #[test]
    fn local_runtime_stands_in_for_openjdk() {
        let probe = StaticVersionProbe::none().with(RuntimeFlavor::Jdk, "21.0.1");
        let eval = evaluator_with(MockBackend::new("amd64"), probe);

        let b = bucket(&["openjdk-17-jdk"]);
        assert!(eval.is_installed(&b).satisfied);
        assert!(eval.is_available(&b).satisfied);
        assert!(eval.is_up_to_date(&b).satisfied);
    }

    #[test]
    fn old_local_runtime_falls_back_to_database() {
        let backend = MockBackend::new("amd64");
        backend.add_installed("openjdk-17-jre");
        let probe = StaticVersionProbe::none().with(RuntimeFlavor::Jre, "11.0.20");
        let eval = evaluator_with(backend, probe);

        assert!(eval.is_up_to_date(&bucket(&["openjdk-17-jre"])).satisfied);
        assert!(!eval.is_up_to_date(&bucket(&["openjdk-21-jre"])).satisfied);
    }

    #[test]
    fn evaluation_sees_reloaded_cache() {
        let backend = Arc::new(MockBackend::new("amd64"));
        let cache = Arc::new(PackageCache::open(backend.clone(), RetryPolicy::default()).unwrap());
        let eval = BucketEvaluator::new(
            Arc::clone(&cache),
            Arc::new(EquivalenceResolver::new(Box::new(StaticVersionProbe::none()))),
        );

        let b = bucket(&["gcc-avr"]);
        assert!(!eval.is_installed(&b).satisfied);

        backend.add_installed("gcc-avr");
        cache.reload().unwrap();
        assert!(eval.is_installed(&b).satisfied);
    }
}
