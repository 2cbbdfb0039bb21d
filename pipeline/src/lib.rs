//! # Bookings Pipeline
//!
//! The four scheduled reconciliation jobs that keep the booking engine and
//! the UNAB system agreeing with each other:
//!
//! - [`ExpiryJob`] cancels unpaid reservations after a grace period so their
//!   slots return to the availability grid.
//! - [`ClosureSyncJob`] pulls the external closure calendar and materializes
//!   it as local closure events.
//! - [`ReportingJob`] pushes settled reservations and subscriptions to UNAB
//!   and keeps the per-record failure bookkeeping.
//! - [`DigestJob`] emails operations a summary of quarantined records.
//!
//! Every job is idempotent, works in bounded chunks, and treats individual
//! record failures as loggable events rather than batch-fatal errors. The
//! [`Scheduler`] runs each job on its own interval, one run at a time.

/// Closure-calendar synchronization job.
pub mod closure_sync;

/// Pipeline tuning knobs.
pub mod config;

/// Quarantine digest job.
pub mod digest;

/// Job errors.
pub mod error;

/// Unpaid-reservation expiry job.
pub mod expiry;

/// Seam over the UNAB client.
pub mod gateway;

/// The job trait and its run summary.
pub mod job;

/// Transaction reporting job.
pub mod reporting;

/// Retry policy for transient UNAB failures.
pub mod retry;

/// Interval scheduler with single-flight job runs.
pub mod scheduler;

pub use closure_sync::ClosureSyncJob;
pub use config::PipelineConfig;
pub use digest::DigestJob;
pub use error::JobError;
pub use expiry::ExpiryJob;
pub use gateway::ReconciliationGateway;
pub use job::{Job, JobSummary};
pub use reporting::ReportingJob;
pub use retry::{retry_transient, RetryPolicy};
pub use scheduler::{Scheduler, SchedulerHandle};

#[cfg(test)]
pub(crate) mod test_support;
