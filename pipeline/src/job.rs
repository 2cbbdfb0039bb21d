//! The job trait the scheduler drives, plus the per-run summary.

use crate::error::JobError;
use async_trait::async_trait;
use std::fmt;

/// A scheduled reconciliation job.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// One full pass.
    ///
    /// # Errors
    ///
    /// Returns a [`JobError`] only when the pass as a whole could not
    /// proceed; per-record failures are absorbed into the summary.
    async fn run(&self) -> Result<JobSummary, JobError>;
}

/// Outcome counts for one job pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobSummary {
    /// Records acted on successfully.
    pub processed: usize,
    /// Records whose individual handling failed.
    pub failed: usize,
    /// Records examined and deliberately left alone.
    pub skipped: usize,
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} failed={} skipped={}",
            self.processed, self.failed, self.skipped
        )
    }
}
