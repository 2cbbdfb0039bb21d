//! Expiry of unpaid reservations.
//!
//! A reservation starts `inicial` while the payment provider does its thing.
//! If no settled payment shows up within the grace period, this job cancels
//! the reservation so the slot returns to the availability grid. When the
//! reservation had already been reported externally, a cancellation notice
//! follows, best-effort.

use crate::config::PipelineConfig;
use crate::error::JobError;
use crate::gateway::ReconciliationGateway;
use crate::job::{Job, JobSummary};
use crate::retry::{retry_transient, RetryPolicy};
use async_trait::async_trait;
use bookings_core::repository::{Clock, ReservationRepository};
use bookings_core::{RepositoryError, Reservation};
use bookings_unab::{CancellationNotice, UnabError};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

enum Outcome {
    Expired,
    Skipped,
}

/// Cancels reservations that never saw a settled payment.
pub struct ExpiryJob {
    reservations: Arc<dyn ReservationRepository>,
    gateway: Arc<dyn ReconciliationGateway>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    retry: RetryPolicy,
}

impl ExpiryJob {
    /// Builds the job.
    #[must_use]
    pub fn new(
        reservations: Arc<dyn ReservationRepository>,
        gateway: Arc<dyn ReconciliationGateway>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            reservations,
            gateway,
            clock,
            config,
            retry,
        }
    }

    async fn expire_one(
        &self,
        reservation: &Reservation,
        now: DateTime<Utc>,
    ) -> Result<Outcome, JobError> {
        // The payment may have settled between the candidate query and this
        // point; re-check before touching anything.
        if let Some(payment) = self.reservations.payment_for(reservation.id).await? {
            if payment.status.is_settled() {
                return Ok(Outcome::Skipped);
            }
        }

        match self.reservations.cancel(reservation.id, now).await {
            Ok(()) => {}
            // Raced with a manual cancellation.
            Err(RepositoryError::NotFound) => return Ok(Outcome::Skipped),
            Err(e) => return Err(e.into()),
        }

        metrics::counter!("bookings_expired_reservations_total").increment(1);
        tracing::info!(
            reservation_id = %reservation.id,
            created_at = %reservation.created_at,
            "cancelled unpaid reservation"
        );

        if let Some(code) = &reservation.external_event_code {
            let notice = CancellationNotice {
                codigo_evento: code.clone(),
            };
            let sent = retry_transient(
                &self.retry,
                || self.gateway.report_cancellation(&notice),
                UnabError::is_transient,
            )
            .await;
            if let Err(e) = sent {
                tracing::warn!(
                    reservation_id = %reservation.id,
                    error = %e,
                    "cancellation notice failed; local cancellation stands"
                );
            }
        }

        Ok(Outcome::Expired)
    }
}

#[async_trait]
impl Job for ExpiryJob {
    fn name(&self) -> &'static str {
        "expiry"
    }

    async fn run(&self) -> Result<JobSummary, JobError> {
        let now = self.clock.now();
        let cutoff = now - Duration::minutes(self.config.expiry_grace_minutes);
        let today = now.date_naive();
        let mut summary = JobSummary::default();

        loop {
            let batch = self
                .reservations
                .expiry_candidates(today, cutoff, self.config.chunk_size)
                .await?;
            if batch.is_empty() {
                break;
            }

            let mut progress = 0usize;
            for reservation in &batch {
                match self.expire_one(reservation, now).await {
                    Ok(Outcome::Expired) => {
                        summary.processed += 1;
                        progress += 1;
                    }
                    Ok(Outcome::Skipped) => summary.skipped += 1,
                    Err(e) => {
                        tracing::error!(
                            reservation_id = %reservation.id,
                            error = %e,
                            "expiry failed for reservation"
                        );
                        summary.failed += 1;
                    }
                }
            }

            // A pass that cancelled nothing will not shrink the candidate
            // set; stop instead of spinning on the same records.
            if progress == 0 || batch.len() < self.config.chunk_size {
                break;
            }
        }

        Ok(summary)
    }
}
