//! Check command implementation.
//!
//! The `umake check` command reports whether a bucket is installed,
//! available and up to date without changing anything.

use serde::Serialize;

use crate::cli::args::CheckArgs;
use crate::error::{Result, UmakeError};
use crate::requirements::{Bucket, BucketEvaluator};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// Outcome of `umake check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// The bucket as given.
    pub bucket: Bucket,
    /// The bucket with alternations resolved.
    pub resolved: Bucket,
    pub installed: bool,
    pub available: bool,
    pub up_to_date: bool,
}

impl CheckReport {
    /// Evaluate a bucket against the current package database.
    pub fn evaluate(evaluator: &BucketEvaluator, bucket: Bucket) -> Self {
        let installed = evaluator.is_installed(&bucket).satisfied;
        let available = evaluator.is_available(&bucket).satisfied;
        let up_to_date = evaluator.is_up_to_date(&bucket);
        Self {
            bucket,
            resolved: up_to_date.bucket,
            installed,
            available,
            up_to_date: up_to_date.satisfied,
        }
    }
}

/// The check command implementation.
pub struct CheckCommand {
    args: CheckArgs,
    evaluator: BucketEvaluator,
}

impl CheckCommand {
    pub fn new(args: CheckArgs, evaluator: BucketEvaluator) -> Self {
        Self { args, evaluator }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &CheckArgs {
        &self.args
    }
}

impl Command for CheckCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let bucket = Bucket::parse(&self.args.packages)?;
        let report = CheckReport::evaluate(&self.evaluator, bucket);

        if self.args.json {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| UmakeError::Other(e.into()))?;
            println!("{}", json);
            return Ok(CommandResult::success());
        }

        ui.show_header(&report.bucket.to_string());
        if report.resolved != report.bucket {
            ui.message(&format!("  resolved to {}", report.resolved));
        }
        ui.show_check("installed", report.installed);
        ui.show_check("available", report.available);
        ui.show_check("up to date", report.up_to_date);

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::equivalence::StaticVersionProbe;
    use crate::requirements::mock::MockBackend;
    use crate::requirements::{EquivalenceResolver, PackageCache, RetryPolicy};
    use crate::ui::MockUI;
    use std::sync::Arc;

    fn evaluator(backend: MockBackend) -> BucketEvaluator {
        let cache = PackageCache::open(Arc::new(backend), RetryPolicy::default()).unwrap();
        BucketEvaluator::new(
            Arc::new(cache),
            Arc::new(EquivalenceResolver::new(Box::new(StaticVersionProbe::none()))),
        )
    }

    fn args(packages: &[&str]) -> CheckArgs {
        CheckArgs {
            packages: packages.iter().map(|s| s.to_string()).collect(),
            json: false,
        }
    }

    #[test]
    fn report_resolves_alternations() {
        let backend = MockBackend::new("amd64");
        backend.add_available("openjdk-11-jdk");
        let report = CheckReport::evaluate(
            &evaluator(backend),
            Bucket::parse(["openjdk-8-jdk | openjdk-11-jdk"]).unwrap(),
        );

        assert!(!report.installed);
        assert!(report.available);
        assert!(!report.up_to_date);
        assert_eq!(report.resolved.to_strings(), vec!["openjdk-11-jdk"]);
    }

    #[test]
    fn check_shows_each_verdict() {
        let backend = MockBackend::new("amd64");
        backend.add_installed("make");
        backend.add_upgradable("gcc");
        let cmd = CheckCommand::new(args(&["make", "gcc"]), evaluator(backend));
        let mut ui = MockUI::new();

        let result = cmd.execute(&mut ui).unwrap();
        assert!(result.success);
        assert_eq!(ui.headers(), &["[make, gcc]".to_string()]);
        assert_eq!(
            ui.checks(),
            &[
                ("installed".to_string(), true),
                ("available".to_string(), true),
                ("up to date".to_string(), false),
            ]
        );
    }

    #[test]
    fn check_rejects_bad_specifier() {
        let cmd = CheckCommand::new(args(&["bad name"]), evaluator(MockBackend::new("amd64")));
        let err = cmd.execute(&mut MockUI::new()).err().unwrap();
        assert!(matches!(err, UmakeError::InvalidSpecifier { .. }));
    }

    #[test]
    fn report_serializes_flat() {
        let backend = MockBackend::new("amd64");
        backend.add_installed("make");
        let report = CheckReport::evaluate(&evaluator(backend), Bucket::parse(["make"]).unwrap());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["bucket"], serde_json::json!(["make"]));
        assert_eq!(json["up_to_date"], true);
    }
}
