//! Progress reporting for package transactions.
//!
//! The package manager reports two kinds of events while committing:
//! download counters and on-disk application percentages. Both are mapped
//! onto a uniform [`ProgressReport`] for callers.

use serde::Serialize;

/// Phase of a running transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Downloading archives.
    Fetching,
    /// Unpacking and configuring packages.
    Applying,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Fetching => write!(f, "fetching"),
            Phase::Applying => write!(f, "applying"),
        }
    }
}

/// Progress delivered to the caller's progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressReport {
    /// Current phase.
    pub phase: Phase,
    /// Completion of the phase, 0 to 100.
    pub percent: f64,
    /// Total download size; only set while fetching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

impl ProgressReport {
    /// A fetch report.
    pub fn fetching(percent: f64, total_bytes: u64) -> Self {
        Self {
            phase: Phase::Fetching,
            percent: clamp_percent(percent),
            total_bytes: Some(total_bytes),
        }
    }

    /// An apply report.
    pub fn applying(percent: f64) -> Self {
        Self {
            phase: Phase::Applying,
            percent: clamp_percent(percent),
            total_bytes: None,
        }
    }
}

/// Raw download counters as the package manager reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounters {
    pub current_bytes: u64,
    pub current_items: u64,
    pub total_bytes: u64,
    pub total_items: u64,
}

impl FetchCounters {
    /// Percent complete.
    ///
    /// Bytes and items are mixed into one scale, the same way APT computes
    /// its own acquire percentage. Nothing to fetch counts as complete.
    pub fn percent(&self) -> f64 {
        let total = self.total_bytes + self.total_items;
        if total == 0 {
            return 100.0;
        }
        let done = self.current_bytes + self.current_items;
        clamp_percent(done as f64 * 100.0 / total as f64)
    }
}

/// Event emitted by a package backend while committing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommitEvent {
    /// Download progress.
    Fetch(FetchCounters),
    /// On-disk application progress, 0 to 100.
    Apply { percent: f64 },
}

impl CommitEvent {
    /// The phase this event belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            CommitEvent::Fetch(_) => Phase::Fetching,
            CommitEvent::Apply { .. } => Phase::Applying,
        }
    }

    /// Translate into a caller-facing report.
    pub fn to_report(&self) -> ProgressReport {
        match self {
            CommitEvent::Fetch(counters) => {
                ProgressReport::fetching(counters.percent(), counters.total_bytes)
            }
            CommitEvent::Apply { percent } => ProgressReport::applying(*percent),
        }
    }
}

/// Callback receiving progress reports.
pub type ProgressCallback = Box<dyn FnMut(ProgressReport) + Send>;

fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_percent_mixes_bytes_and_items() {
        let counters = FetchCounters {
            current_bytes: 48,
            current_items: 2,
            total_bytes: 96,
            total_items: 4,
        };
        assert_eq!(counters.percent(), 50.0);
    }

    #[test]
    fn fetch_percent_with_nothing_to_fetch_is_complete() {
        assert_eq!(FetchCounters::default().percent(), 100.0);
    }

    #[test]
    fn fetch_percent_is_clamped() {
        let counters = FetchCounters {
            current_bytes: 500,
            current_items: 5,
            total_bytes: 100,
            total_items: 1,
        };
        assert_eq!(counters.percent(), 100.0);
    }

    #[test]
    fn fetch_event_reports_total_bytes() {
        let event = CommitEvent::Fetch(FetchCounters {
            current_bytes: 0,
            current_items: 0,
            total_bytes: 1024,
            total_items: 2,
        });
        let report = event.to_report();
        assert_eq!(report.phase, Phase::Fetching);
        assert_eq!(report.percent, 0.0);
        assert_eq!(report.total_bytes, Some(1024));
    }

    #[test]
    fn apply_event_has_no_total_bytes() {
        let report = CommitEvent::Apply { percent: 42.5 }.to_report();
        assert_eq!(report.phase, Phase::Applying);
        assert_eq!(report.percent, 42.5);
        assert!(report.total_bytes.is_none());
    }

    #[test]
    fn nan_percent_becomes_zero() {
        assert_eq!(ProgressReport::applying(f64::NAN).percent, 0.0);
    }

    #[test]
    fn report_serializes_phase_lowercase() {
        let json = serde_json::to_string(&ProgressReport::applying(100.0)).unwrap();
        assert_eq!(json, r#"{"phase":"applying","percent":100.0}"#);
    }
}
