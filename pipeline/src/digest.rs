//! Operations digest of quarantined records.
//!
//! Records that hit the failure threshold stop being retried; this job
//! collects them into a single summary and hands it to the notification
//! sink. Delivery is best-effort: a sink failure is logged and the next
//! pass simply tries again.

use crate::config::PipelineConfig;
use crate::error::JobError;
use crate::job::{Job, JobSummary};
use async_trait::async_trait;
use bookings_core::repository::{
    Clock, DigestEntry, DigestRecordKind, FailureDigest, NotificationSink, ReservationRepository,
    SubscriptionRepository,
};
use std::sync::Arc;

/// Sends operations a summary of quarantined records.
pub struct DigestJob {
    reservations: Arc<dyn ReservationRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl DigestJob {
    /// Builds the job.
    #[must_use]
    pub fn new(
        reservations: Arc<dyn ReservationRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            reservations,
            subscriptions,
            sink,
            clock,
            config,
        }
    }

    async fn collect(&self) -> Result<Vec<DigestEntry>, JobError> {
        let threshold = self.config.quarantine_threshold;
        let limit = self.config.chunk_size;
        let mut entries = Vec::new();

        for reservation in self.reservations.quarantined(threshold, limit).await? {
            entries.push(DigestEntry {
                kind: DigestRecordKind::Reservation,
                id: reservation.id.to_string(),
                failure_count: reservation.report.failure_count,
                last_error: reservation.report.last_error,
            });
        }
        for subscription in self.subscriptions.quarantined(threshold, limit).await? {
            entries.push(DigestEntry {
                kind: DigestRecordKind::Subscription,
                id: subscription.id.to_string(),
                failure_count: subscription.report.failure_count,
                last_error: subscription.report.last_error,
            });
        }

        Ok(entries)
    }
}

#[async_trait]
impl Job for DigestJob {
    fn name(&self) -> &'static str {
        "digest"
    }

    async fn run(&self) -> Result<JobSummary, JobError> {
        let entries = self.collect().await?;
        if entries.is_empty() {
            return Ok(JobSummary::default());
        }

        let count = entries.len();
        metrics::gauge!("bookings_quarantined_records").set(count as f64);
        let digest = FailureDigest {
            generated_at: self.clock.now(),
            entries,
        };

        match self.sink.send_digest(&digest).await {
            Ok(()) => {
                tracing::info!(entries = count, "sent quarantine digest");
                Ok(JobSummary {
                    processed: count,
                    ..JobSummary::default()
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "quarantine digest delivery failed");
                Ok(JobSummary {
                    failed: count,
                    ..JobSummary::default()
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookings_testing::fixtures;
    use bookings_testing::{
        CaptureSink, FixedClock, InMemoryReservations, InMemorySubscriptions,
    };
    use chrono::{TimeZone, Utc};

    struct Harness {
        reservations: Arc<InMemoryReservations>,
        subscriptions: Arc<InMemorySubscriptions>,
        sink: Arc<CaptureSink>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                reservations: Arc::new(InMemoryReservations::default()),
                subscriptions: Arc::new(InMemorySubscriptions::default()),
                sink: Arc::new(CaptureSink::default()),
            }
        }

        fn job(&self) -> DigestJob {
            let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());
            DigestJob::new(
                Arc::clone(&self.reservations) as _,
                Arc::clone(&self.subscriptions) as _,
                Arc::clone(&self.sink) as _,
                Arc::new(clock),
                PipelineConfig::default(),
            )
        }

        async fn quarantine_reservation(&self) {
            let mut reservation = fixtures::reservation(
                bookings_core::SpaceId::new(),
                Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            );
            reservation.report.failure_count = 5;
            reservation.report.last_error = Some("persona desconocida".into());
            self.reservations.add(reservation).await;
        }

        async fn quarantine_subscription(&self) {
            let mut subscription = fixtures::subscription(
                bookings_core::SpaceId::new(),
                Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            );
            subscription.report.failure_count = 7;
            self.subscriptions.add(subscription).await;
        }
    }

    #[tokio::test]
    async fn quarantined_records_of_both_kinds_are_digested() {
        let h = Harness::new();
        h.quarantine_reservation().await;
        h.quarantine_subscription().await;

        let summary = h.job().run().await.unwrap();

        assert_eq!(summary.processed, 2);
        let digests = h.sink.digests().await;
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].entries.len(), 2);
        assert!(digests[0]
            .entries
            .iter()
            .any(|e| e.kind == DigestRecordKind::Reservation
                && e.last_error.as_deref() == Some("persona desconocida")));
        assert!(digests[0]
            .entries
            .iter()
            .any(|e| e.kind == DigestRecordKind::Subscription && e.failure_count == 7));
    }

    #[tokio::test]
    async fn nothing_quarantined_sends_nothing() {
        let h = Harness::new();

        let summary = h.job().run().await.unwrap();

        assert_eq!(summary, JobSummary::default());
        assert!(h.sink.digests().await.is_empty());
    }

    #[tokio::test]
    async fn sink_failure_is_absorbed() {
        let h = Harness::new();
        h.quarantine_reservation().await;
        h.sink.fail_next().await;

        let summary = h.job().run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(h.sink.digests().await.is_empty());
    }
}
