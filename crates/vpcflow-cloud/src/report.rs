//! Run outcomes

use crate::action::Mode;
use crate::error::ReconcileError;
use crate::resource::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyExists,
    AlreadyAbsent,
    /// Provider-managed default, never deleted explicitly
    DefaultResource,
    /// Nothing to do for this resource in its current state
    NotApplicable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyExists => write!(f, "already exists"),
            SkipReason::AlreadyAbsent => write!(f, "already absent"),
            SkipReason::DefaultResource => write!(f, "default resource"),
            SkipReason::NotApplicable => write!(f, "not applicable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Deleted,
    /// Attach, detach or release
    Updated,
    Verified,
    Skipped(SkipReason),
    Failed(String),
}

impl Outcome {
    pub fn is_change(&self) -> bool {
        matches!(self, Outcome::Created | Outcome::Deleted | Outcome::Updated)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => write!(f, "created"),
            Outcome::Deleted => write!(f, "deleted"),
            Outcome::Updated => write!(f, "updated"),
            Outcome::Verified => write!(f, "ok"),
            Outcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcome of one executed operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Position in the plan
    pub index: usize,
    pub kind: ResourceKind,
    pub name: String,
    pub description: String,
    pub outcome: Outcome,
    pub resource_id: Option<String>,
}

/// Result of executing a plan
///
/// Steps after a failure are never attempted and do not appear here.
#[derive(Debug)]
pub struct RunReport {
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    pub records: Vec<StepRecord>,
    pub failure: Option<ReconcileError>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            records: Vec::new(),
            failure: None,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            created: self.count(|o| *o == Outcome::Created),
            updated: self.count(|o| *o == Outcome::Updated),
            deleted: self.count(|o| *o == Outcome::Deleted),
            skipped: self.count(|o| matches!(o, Outcome::Skipped(_))),
            failed: self.count(|o| matches!(o, Outcome::Failed(_))),
        }
    }

    /// Convert into `Err` when the run stopped on a failure
    pub fn into_result(self) -> Result<Vec<StepRecord>, ReconcileError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.records),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged",
            self.created, self.updated, self.deleted, self.skipped
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, outcome: Outcome) -> StepRecord {
        StepRecord {
            index,
            kind: ResourceKind::Subnet,
            name: format!("subnet-{}", index),
            description: String::new(),
            outcome,
            resource_id: None,
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut report = RunReport::new(Mode::Create);
        report.records.push(record(0, Outcome::Verified));
        report.records.push(record(1, Outcome::Created));
        report
            .records
            .push(record(2, Outcome::Skipped(SkipReason::AlreadyExists)));
        report.records.push(record(3, Outcome::Failed("boom".to_string())));

        let summary = report.summary();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            summary.to_string(),
            "1 created, 0 updated, 0 deleted, 1 unchanged, 1 failed"
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            Outcome::Skipped(SkipReason::AlreadyAbsent).to_string(),
            "skipped (already absent)"
        );
        assert!(Outcome::Updated.is_change());
        assert!(!Outcome::Verified.is_change());
    }
}
