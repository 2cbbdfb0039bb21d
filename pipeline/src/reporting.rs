//! Reporting of settled reservations and subscriptions.
//!
//! Each pass takes one batch of unreported, settled records per kind and
//! pushes them to UNAB as transaction reports. A success persists the
//! echoed identity-linking codes; a failure bumps the record's failure
//! counter, and the fifth consecutive failure quarantines it until an
//! operator intervenes. Spaces billed through the gym's own channel are
//! never reported; their settled records are marked resolved on first
//! sight so they do not occupy batch slots.

use crate::config::PipelineConfig;
use crate::error::JobError;
use crate::gateway::ReconciliationGateway;
use crate::job::{Job, JobSummary};
use crate::retry::{retry_transient, RetryPolicy};
use async_trait::async_trait;
use bookings_core::repository::{ReservationRepository, SpaceCatalog, SubscriptionRepository};
use bookings_core::{BillingIdentity, BillingKind, Reservation, Space, Subscription};
use bookings_unab::{ReportAck, TransactionLine, TransactionReport, UnabError};
use std::sync::Arc;

enum Outcome {
    Reported(ReportAck),
    Skipped,
    Failed(String),
}

/// Pushes settled records to the external billing system.
pub struct ReportingJob {
    reservations: Arc<dyn ReservationRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    catalog: Arc<dyn SpaceCatalog>,
    gateway: Arc<dyn ReconciliationGateway>,
    config: PipelineConfig,
    retry: RetryPolicy,
}

impl ReportingJob {
    /// Builds the job.
    #[must_use]
    pub fn new(
        reservations: Arc<dyn ReservationRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        catalog: Arc<dyn SpaceCatalog>,
        gateway: Arc<dyn ReconciliationGateway>,
        config: PipelineConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            reservations,
            subscriptions,
            catalog,
            gateway,
            config,
            retry,
        }
    }

    fn assemble(
        space: &Space,
        identity: BillingIdentity,
        line: TransactionLine,
        ticket: Option<String>,
    ) -> TransactionReport {
        let total = line.valor;
        TransactionReport {
            codigo_edificio: space.building_code.clone().unwrap_or_default(),
            codigo_espacio: space.space_code.clone().unwrap_or_default(),
            nombre: identity.full_name,
            documento: identity.document,
            correo: identity.email,
            direccion: identity.address,
            codigo_ciudad: identity.city_code,
            codigo_region: identity.region_code,
            detalle: vec![line],
            ticket,
            total,
        }
    }

    async fn send(&self, report: &TransactionReport) -> Result<ReportAck, UnabError> {
        retry_transient(
            &self.retry,
            || self.gateway.report_transaction(report),
            UnabError::is_transient,
        )
        .await
    }

    async fn report_reservation(&self, reservation: &Reservation) -> Result<Outcome, JobError> {
        let Some(space) = self.catalog.find(reservation.space_id).await? else {
            return Ok(Outcome::Failed("space not found in catalog".into()));
        };
        // Gym usage is billed through the gym's own subscription channel.
        // Marked resolved so it leaves the unreported set; otherwise settled
        // gym rows sit at the head of every batch and starve younger records.
        if space.billing_kind == BillingKind::Gym {
            self.reservations
                .mark_reported(reservation.id, None, None)
                .await?;
            return Ok(Outcome::Skipped);
        }
        let Some(identity) = self
            .catalog
            .billing_identity(reservation.requester_id)
            .await?
        else {
            return Ok(Outcome::Failed("missing billing identity".into()));
        };

        let ticket = self
            .reservations
            .payment_for(reservation.id)
            .await?
            .map(|p| p.ticket_id);
        let amount = reservation.price.unwrap_or(0);
        let report = Self::assemble(
            &space,
            identity,
            TransactionLine {
                fecha: reservation.date.format("%Y-%m-%d").to_string(),
                hora_inicio: reservation.starts_at.format("%H:%M").to_string(),
                hora_fin: reservation.ends_at.format("%H:%M").to_string(),
                valor: amount,
            },
            ticket,
        );

        match self.send(&report).await {
            Ok(ack) => Ok(Outcome::Reported(ack)),
            Err(e) => Ok(Outcome::Failed(e.to_string())),
        }
    }

    async fn report_subscription(&self, subscription: &Subscription) -> Result<Outcome, JobError> {
        let Some(space) = self.catalog.find(subscription.space_id).await? else {
            return Ok(Outcome::Failed("space not found in catalog".into()));
        };
        let Some(identity) = self
            .catalog
            .billing_identity(subscription.requester_id)
            .await?
        else {
            return Ok(Outcome::Failed("missing billing identity".into()));
        };

        let ticket = self
            .subscriptions
            .payment_for(subscription.id)
            .await?
            .map(|p| p.ticket_id);
        // A subscription covers whole days; the line carries its first day.
        let report = Self::assemble(
            &space,
            identity,
            TransactionLine {
                fecha: subscription.starts_on.format("%Y-%m-%d").to_string(),
                hora_inicio: "00:00".into(),
                hora_fin: "23:59".into(),
                valor: subscription.price,
            },
            ticket,
        );

        match self.send(&report).await {
            Ok(ack) => Ok(Outcome::Reported(ack)),
            Err(e) => Ok(Outcome::Failed(e.to_string())),
        }
    }

    async fn pass_reservations(&self, summary: &mut JobSummary) -> Result<(), JobError> {
        let batch = self
            .reservations
            .unreported(self.config.quarantine_threshold, self.config.chunk_size)
            .await?;

        for reservation in &batch {
            match self.report_reservation(reservation).await? {
                Outcome::Reported(ack) => {
                    self.reservations
                        .mark_reported(
                            reservation.id,
                            ack.codigo_persona.as_deref(),
                            ack.codigo_evento.as_deref(),
                        )
                        .await?;
                    metrics::counter!("bookings_reports_sent_total", "kind" => "reservation")
                        .increment(1);
                    summary.processed += 1;
                }
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed(message) => {
                    tracing::warn!(
                        reservation_id = %reservation.id,
                        failure_count = reservation.report.failure_count + 1,
                        error = %message,
                        "reservation report failed"
                    );
                    self.reservations
                        .record_failure(reservation.id, &message)
                        .await?;
                    metrics::counter!("bookings_report_failures_total", "kind" => "reservation")
                        .increment(1);
                    summary.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn pass_subscriptions(&self, summary: &mut JobSummary) -> Result<(), JobError> {
        let batch = self
            .subscriptions
            .unreported(self.config.quarantine_threshold, self.config.chunk_size)
            .await?;

        for subscription in &batch {
            match self.report_subscription(subscription).await? {
                Outcome::Reported(ack) => {
                    self.subscriptions
                        .mark_reported(
                            subscription.id,
                            ack.codigo_persona.as_deref(),
                            ack.codigo_evento.as_deref(),
                        )
                        .await?;
                    metrics::counter!("bookings_reports_sent_total", "kind" => "subscription")
                        .increment(1);
                    summary.processed += 1;
                }
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed(message) => {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        failure_count = subscription.report.failure_count + 1,
                        error = %message,
                        "subscription report failed"
                    );
                    self.subscriptions
                        .record_failure(subscription.id, &message)
                        .await?;
                    metrics::counter!("bookings_report_failures_total", "kind" => "subscription")
                        .increment(1);
                    summary.failed += 1;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Job for ReportingJob {
    fn name(&self) -> &'static str {
        "reporting"
    }

    async fn run(&self) -> Result<JobSummary, JobError> {
        let mut summary = JobSummary::default();
        self.pass_reservations(&mut summary).await?;
        self.pass_subscriptions(&mut summary).await?;
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::StubGateway;
    use bookings_core::ReservationStatus;
    use bookings_testing::fixtures;
    use bookings_testing::{InMemoryCatalog, InMemoryReservations, InMemorySubscriptions};
    use chrono::{TimeZone, Utc};

    struct Harness {
        reservations: Arc<InMemoryReservations>,
        subscriptions: Arc<InMemorySubscriptions>,
        catalog: Arc<InMemoryCatalog>,
        gateway: Arc<StubGateway>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                reservations: Arc::new(InMemoryReservations::default()),
                subscriptions: Arc::new(InMemorySubscriptions::default()),
                catalog: Arc::new(InMemoryCatalog::default()),
                gateway: Arc::new(StubGateway::default()),
            }
        }

        fn job(&self) -> ReportingJob {
            ReportingJob::new(
                Arc::clone(&self.reservations) as _,
                Arc::clone(&self.subscriptions) as _,
                Arc::clone(&self.catalog) as _,
                Arc::clone(&self.gateway) as _,
                PipelineConfig::default(),
                RetryPolicy::no_retries(),
            )
        }

        /// A paid reservation in a standard space with a known identity.
        async fn seed_paid_reservation(&self) -> bookings_core::ReservationId {
            let space = fixtures::space();
            let mut reservation =
                fixtures::reservation(space.id, Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
            reservation.status = ReservationStatus::Pagada;
            let id = reservation.id;
            self.catalog
                .add_identity(fixtures::billing_identity(reservation.requester_id))
                .await;
            self.catalog.add_space(space).await;
            self.reservations.add(reservation).await;
            self.reservations
                .add_payment(id, fixtures::payment_ok(5000))
                .await;
            id
        }
    }

    #[tokio::test]
    async fn settled_reservation_is_reported_with_echoed_codes() {
        let h = Harness::new();
        let id = h.seed_paid_reservation().await;

        let summary = h.job().run().await.unwrap();

        assert_eq!(summary.processed, 1);
        let stored = h.reservations.get(id).await.unwrap();
        assert!(stored.report.reported);
        assert_eq!(stored.external_person_id.as_deref(), Some("P-1"));
        assert_eq!(stored.external_event_code.as_deref(), Some("EV-1"));

        let sent = h.gateway.reports.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].documento, "12345678-9");
        assert_eq!(sent[0].ticket.as_deref(), Some("TK-900"));
        assert_eq!(sent[0].total, 5000);
        assert_eq!(sent[0].detalle[0].fecha, "2026-03-02");
        assert_eq!(sent[0].detalle[0].hora_inicio, "14:00");
    }

    #[tokio::test]
    async fn gym_spaces_are_excluded_from_reservation_reporting() {
        let h = Harness::new();
        let mut space = fixtures::space();
        space.billing_kind = BillingKind::Gym;
        let mut reservation =
            fixtures::reservation(space.id, Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        reservation.status = ReservationStatus::Pagada;
        let id = reservation.id;
        h.catalog.add_space(space).await;
        h.reservations.add(reservation).await;
        h.reservations.add_payment(id, fixtures::payment_ok(5000)).await;

        let summary = h.job().run().await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert!(h.gateway.reports.lock().await.is_empty());
        // Marked resolved without a report, so it leaves the candidate set.
        let stored = h.reservations.get(id).await.unwrap();
        assert!(stored.report.reported);
        assert_eq!(stored.report.failure_count, 0);
        assert!(stored.external_event_code.is_none());
        assert!(h.reservations.unreported(5, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settled_gym_reservations_do_not_starve_younger_batches() {
        let h = Harness::new();
        let gym_space = {
            let mut s = fixtures::space();
            s.billing_kind = BillingKind::Gym;
            s
        };
        let mut gym_reservation = fixtures::reservation(
            gym_space.id,
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        );
        gym_reservation.status = ReservationStatus::Pagada;
        let gym_id = gym_reservation.id;
        h.catalog.add_space(gym_space).await;
        h.reservations.add(gym_reservation).await;
        h.reservations
            .add_payment(gym_id, fixtures::payment_ok(5000))
            .await;
        // Younger, standard-billed reservation behind the gym one.
        let standard_id = h.seed_paid_reservation().await;

        // With a one-record batch the gym reservation fills the first run;
        // it must not fill every run after that.
        let job = ReportingJob::new(
            Arc::clone(&h.reservations) as _,
            Arc::clone(&h.subscriptions) as _,
            Arc::clone(&h.catalog) as _,
            Arc::clone(&h.gateway) as _,
            PipelineConfig {
                chunk_size: 1,
                ..PipelineConfig::default()
            },
            RetryPolicy::no_retries(),
        );

        let first = job.run().await.unwrap();
        assert_eq!(first.skipped, 1);
        assert_eq!(first.processed, 0);

        let second = job.run().await.unwrap();
        assert_eq!(second.processed, 1);
        assert!(h.reservations.get(standard_id).await.unwrap().report.reported);
        assert_eq!(h.gateway.reports.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_identity_records_a_failure() {
        let h = Harness::new();
        let space = fixtures::space();
        let mut reservation =
            fixtures::reservation(space.id, Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        reservation.status = ReservationStatus::Pagada;
        let id = reservation.id;
        h.catalog.add_space(space).await;
        h.reservations.add(reservation).await;
        h.reservations.add_payment(id, fixtures::payment_ok(5000)).await;

        let summary = h.job().run().await.unwrap();

        assert_eq!(summary.failed, 1);
        let stored = h.reservations.get(id).await.unwrap();
        assert_eq!(stored.report.failure_count, 1);
        assert!(stored.report.last_error.unwrap().contains("identity"));
    }

    #[tokio::test]
    async fn task_rejection_records_the_mensaje() {
        let h = Harness::new();
        let id = h.seed_paid_reservation().await;
        h.gateway
            .script_report(Err(UnabError::TaskRejected {
                mensaje: "persona desconocida".into(),
            }))
            .await;

        let summary = h.job().run().await.unwrap();

        assert_eq!(summary.failed, 1);
        let stored = h.reservations.get(id).await.unwrap();
        assert!(!stored.report.reported);
        assert!(stored
            .report
            .last_error
            .unwrap()
            .contains("persona desconocida"));
    }

    #[tokio::test]
    async fn fifth_consecutive_failure_quarantines_the_record() {
        let h = Harness::new();
        let space = fixtures::space();
        let mut reservation =
            fixtures::reservation(space.id, Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        reservation.status = ReservationStatus::Pagada;
        reservation.report.failure_count = 4;
        let id = reservation.id;
        h.catalog.add_space(space).await;
        h.reservations.add(reservation).await;
        h.reservations.add_payment(id, fixtures::payment_ok(5000)).await;
        h.gateway.script_report(Err(UnabError::Timeout)).await;

        h.job().run().await.unwrap();

        let stored = h.reservations.get(id).await.unwrap();
        assert_eq!(stored.report.failure_count, 5);
        assert!(h.reservations.unreported(5, 10).await.unwrap().is_empty());
        assert_eq!(h.reservations.quarantined(5, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscriptions_are_reported_too() {
        let h = Harness::new();
        let space = fixtures::space();
        let subscription =
            fixtures::subscription(space.id, Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        let id = subscription.id;
        h.catalog
            .add_identity(fixtures::billing_identity(subscription.requester_id))
            .await;
        h.catalog.add_space(space).await;
        h.subscriptions.add(subscription).await;
        h.subscriptions
            .add_payment(id, fixtures::payment_ok(45_000))
            .await;

        let summary = h.job().run().await.unwrap();

        assert_eq!(summary.processed, 1);
        let stored = h.subscriptions.get(id).await.unwrap();
        assert!(stored.report.reported);
        assert_eq!(stored.external_event_code.as_deref(), Some("EV-1"));

        let sent = h.gateway.reports.lock().await;
        assert_eq!(sent[0].total, 45_000);
        assert_eq!(sent[0].detalle[0].hora_fin, "23:59");
    }

    #[tokio::test]
    async fn unsettled_reservations_are_not_picked_up() {
        let h = Harness::new();
        let space = fixtures::space();
        let reservation =
            fixtures::reservation(space.id, Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        h.catalog.add_space(space).await;
        h.reservations.add(reservation).await;

        let summary = h.job().run().await.unwrap();

        assert_eq!(summary, JobSummary::default());
        assert!(h.gateway.reports.lock().await.is_empty());
    }
}
