//! Digest delivery.
//!
//! The digest's delivery channel is operational plumbing owned by the
//! notifications team; until that lands the worker surfaces quarantined
//! records through structured logs, which the on-call alerting already
//! watches.

use async_trait::async_trait;
use bookings_core::repository::{FailureDigest, NotificationError, NotificationSink};

/// Sink that renders the digest into the worker's log stream.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send_digest(&self, digest: &FailureDigest) -> Result<(), NotificationError> {
        tracing::warn!(
            generated_at = %digest.generated_at,
            quarantined = digest.entries.len(),
            "quarantine digest"
        );
        for entry in &digest.entries {
            tracing::warn!(
                kind = ?entry.kind,
                id = %entry.id,
                failure_count = entry.failure_count,
                last_error = entry.last_error.as_deref().unwrap_or("-"),
                "quarantined record"
            );
        }
        Ok(())
    }
}
