//! Synchronization of the external closure calendar.
//!
//! For every active space carrying UNAB codes, the job queries the upstream
//! calendar over a rolling window, expands each record into individual
//! days honoring its weekday flags, and inserts a local closure event per
//! day that is open for booking and not already covered. Malformed rows and
//! failing spaces are logged and skipped; they never abort the pass.

use crate::config::PipelineConfig;
use crate::error::JobError;
use crate::gateway::ReconciliationGateway;
use crate::job::{Job, JobSummary};
use crate::retry::{retry_transient, RetryPolicy};
use async_trait::async_trait;
use bookings_core::repository::{Clock, ClosureRepository, SpaceCatalog};
use bookings_core::{
    ClosureEvent, ClosureId, ClosureKind, ClosureOrigin, ConfigurationResolver, Space,
};
use bookings_unab::{ClosureQuery, ClosureRecord, UnabError};
use chrono::{Duration, NaiveDate};
use std::sync::Arc;

/// Mirrors the external closure calendar into local closure events.
pub struct ClosureSyncJob {
    catalog: Arc<dyn SpaceCatalog>,
    closures: Arc<dyn ClosureRepository>,
    resolver: ConfigurationResolver,
    gateway: Arc<dyn ReconciliationGateway>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    retry: RetryPolicy,
}

impl ClosureSyncJob {
    /// Builds the job.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn SpaceCatalog>,
        closures: Arc<dyn ClosureRepository>,
        resolver: ConfigurationResolver,
        gateway: Arc<dyn ReconciliationGateway>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            closures,
            resolver,
            gateway,
            clock,
            config,
            retry,
        }
    }

    async fn sync_space(
        &self,
        space: &Space,
        today: NaiveDate,
        until: NaiveDate,
    ) -> Result<(usize, usize), JobError> {
        let (Some(building), Some(code)) = (&space.building_code, &space.space_code) else {
            return Ok((0, 0));
        };

        let query = ClosureQuery::new(building, code, today, until);
        let rows = retry_transient(
            &self.retry,
            || self.gateway.query_closures(&query),
            UnabError::is_transient,
        )
        .await?;

        let mut inserted = 0;
        let mut skipped = 0;
        for row in &rows {
            let record = match row.validate() {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        space_id = %space.id,
                        error = %e,
                        "skipping malformed closure row"
                    );
                    skipped += 1;
                    continue;
                }
            };

            let (done, passed) = self
                .materialize(space, &record, today, until)
                .await?;
            inserted += done;
            skipped += passed;
        }

        Ok((inserted, skipped))
    }

    /// Expands one record into per-day closure events.
    async fn materialize(
        &self,
        space: &Space,
        record: &ClosureRecord,
        today: NaiveDate,
        until: NaiveDate,
    ) -> Result<(usize, usize), JobError> {
        let mut inserted = 0;
        let mut skipped = 0;

        for day in record.days_within(today, until) {
            // Days the space is closed, or not yet open for booking, have no
            // slots a closure could block.
            let Some(config) = self.resolver.resolve(space.id, day).await? else {
                skipped += 1;
                continue;
            };
            if day > today + Duration::days(i64::from(config.booking_open_days)) {
                skipped += 1;
                continue;
            }

            if self
                .closures
                .exists_matching(space.id, day, record.starts_at, record.ends_at)
                .await?
            {
                skipped += 1;
                continue;
            }

            let description = if record.description.is_empty() {
                "cierre externo".to_string()
            } else {
                record.description.clone()
            };
            self.closures
                .insert(&ClosureEvent {
                    id: ClosureId::new(),
                    space_id: space.id,
                    date: day,
                    starts_at: record.starts_at,
                    ends_at: record.ends_at,
                    description,
                    kind: ClosureKind::Closed,
                    origin: ClosureOrigin::ExternalSync,
                    deleted_at: None,
                })
                .await?;
            metrics::counter!("bookings_closures_synced_total").increment(1);
            inserted += 1;
        }

        Ok((inserted, skipped))
    }
}

#[async_trait]
impl Job for ClosureSyncJob {
    fn name(&self) -> &'static str {
        "closure-sync"
    }

    async fn run(&self) -> Result<JobSummary, JobError> {
        let today = self.clock.now().date_naive();
        let until = today + Duration::days(self.config.closure_window_days);
        let mut summary = JobSummary::default();

        for space in self.catalog.active_with_codes().await? {
            match self.sync_space(&space, today, until).await {
                Ok((inserted, skipped)) => {
                    summary.processed += inserted;
                    summary.skipped += skipped;
                }
                Err(e) => {
                    tracing::error!(
                        space_id = %space.id,
                        space = %space.name,
                        error = %e,
                        "closure sync failed for space"
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::StubGateway;
    use bookings_core::{ScheduleScope, SpaceId};
    use bookings_testing::fixtures;
    use bookings_testing::{FixedClock, FixedHolidays, InMemoryClosures, InMemorySchedules};
    use bookings_unab::RawClosureRow;
    use chrono::NaiveTime;
    use serde_json::json;
    use std::time::Duration as StdDuration;

    struct Harness {
        catalog: Arc<bookings_testing::InMemoryCatalog>,
        closures: Arc<InMemoryClosures>,
        schedules: Arc<InMemorySchedules>,
        gateway: Arc<StubGateway>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                catalog: Arc::new(bookings_testing::InMemoryCatalog::default()),
                closures: Arc::new(InMemoryClosures::default()),
                schedules: Arc::new(InMemorySchedules::default()),
                gateway: Arc::new(StubGateway::default()),
            }
        }

        async fn add_space(&self) -> SpaceId {
            let space = fixtures::space();
            let id = space.id;
            self.catalog.add_space(space).await;
            id
        }

        /// One weekday configuration per ISO weekday, all opening the same
        /// number of days ahead.
        async fn open_weekdays(&self, space_id: SpaceId, weekdays: &[u8], open_days: u32) {
            for &weekday in weekdays {
                let mut config = fixtures::schedule_config(space_id);
                config.scope = ScheduleScope::Weekday(weekday);
                config.booking_open_days = open_days;
                self.schedules.add(config).await;
            }
        }

        fn job(&self, retry: RetryPolicy) -> ClosureSyncJob {
            let resolver = ConfigurationResolver::new(
                Arc::clone(&self.schedules) as _,
                Arc::new(FixedHolidays::default()),
            );
            let clock = FixedClock(fixtures::monday().and_hms_opt(9, 0, 0).unwrap().and_utc());
            ClosureSyncJob::new(
                Arc::clone(&self.catalog) as _,
                Arc::clone(&self.closures) as _,
                resolver,
                Arc::clone(&self.gateway) as _,
                Arc::new(clock),
                PipelineConfig::default(),
                retry,
            )
        }
    }

    fn daily_row(from: &str, to: &str) -> RawClosureRow {
        serde_json::from_value(json!({
            "fecha_inicio": from,
            "fecha_fin": to,
            "hora_inicio": "08:00",
            "hora_fin": "10:00",
            "descripcion": "torneo"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn flagged_days_become_closure_events() {
        let h = Harness::new();
        let space_id = h.add_space().await;
        h.open_weekdays(space_id, &[1, 2, 3, 4, 5, 6, 7], 30).await;
        let row: RawClosureRow = serde_json::from_value(json!({
            "fecha_inicio": "2026-03-02",
            "fecha_fin": "2026-03-08",
            "hora_inicio": "08:00",
            "hora_fin": "10:00",
            "descripcion": "torneo",
            "lunes": 1,
            "viernes": 1
        }))
        .unwrap();
        h.gateway.script_closures(Ok(vec![row])).await;

        let summary = h.job(RetryPolicy::no_retries()).run().await.unwrap();

        assert_eq!(summary.processed, 2);
        let stored = h.closures.all().await;
        assert_eq!(stored.len(), 2);
        let dates: Vec<_> = stored.iter().map(|c| c.date).collect();
        assert!(dates.contains(&fixtures::monday()));
        assert!(dates.contains(&(fixtures::monday() + Duration::days(4))));
        assert!(stored
            .iter()
            .all(|c| c.origin == ClosureOrigin::ExternalSync && c.kind == ClosureKind::Closed));
        assert_eq!(
            stored[0].starts_at,
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn second_run_inserts_nothing_new() {
        let h = Harness::new();
        let space_id = h.add_space().await;
        h.open_weekdays(space_id, &[1, 2, 3, 4, 5, 6, 7], 30).await;
        h.gateway
            .script_closures(Ok(vec![daily_row("2026-03-02", "2026-03-03")]))
            .await;
        h.gateway
            .script_closures(Ok(vec![daily_row("2026-03-02", "2026-03-03")]))
            .await;

        let job = h.job(RetryPolicy::no_retries());
        let first = job.run().await.unwrap();
        let second = job.run().await.unwrap();

        assert_eq!(first.processed, 2);
        assert_eq!(second.processed, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(h.closures.all().await.len(), 2);
    }

    #[tokio::test]
    async fn malformed_rows_are_skipped_with_the_rest_processed() {
        let h = Harness::new();
        let space_id = h.add_space().await;
        h.open_weekdays(space_id, &[1, 2, 3, 4, 5, 6, 7], 30).await;
        h.gateway
            .script_closures(Ok(vec![
                RawClosureRow::default(),
                daily_row("2026-03-02", "2026-03-03"),
            ]))
            .await;

        let summary = h.job(RetryPolicy::no_retries()).run().await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(h.closures.all().await.len(), 2);
    }

    #[tokio::test]
    async fn days_beyond_the_booking_horizon_are_skipped() {
        let h = Harness::new();
        let space_id = h.add_space().await;
        h.open_weekdays(space_id, &[1, 2, 3, 4, 5, 6, 7], 3).await;
        h.gateway
            .script_closures(Ok(vec![daily_row("2026-03-02", "2026-03-10")]))
            .await;

        let summary = h.job(RetryPolicy::no_retries()).run().await.unwrap();

        // Monday the 2nd plus a 3-day horizon: the 2nd through the 5th.
        assert_eq!(summary.processed, 4);
        assert!(h
            .closures
            .all()
            .await
            .iter()
            .all(|c| c.date <= fixtures::monday() + Duration::days(3)));
    }

    #[tokio::test]
    async fn closed_days_get_no_closure_events() {
        let h = Harness::new();
        let space_id = h.add_space().await;
        // Only open on Mondays.
        h.open_weekdays(space_id, &[1], 30).await;
        h.gateway
            .script_closures(Ok(vec![daily_row("2026-03-02", "2026-03-08")]))
            .await;

        let summary = h.job(RetryPolicy::no_retries()).run().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(h.closures.all().await[0].date, fixtures::monday());
    }

    #[tokio::test]
    async fn a_failing_space_does_not_block_the_next() {
        let h = Harness::new();
        let first = h.add_space().await;
        let second = h.add_space().await;
        h.open_weekdays(first, &[1, 2, 3, 4, 5, 6, 7], 30).await;
        h.open_weekdays(second, &[1, 2, 3, 4, 5, 6, 7], 30).await;
        h.gateway
            .script_closures(Err(bookings_unab::UnabError::Unauthorized))
            .await;
        h.gateway
            .script_closures(Ok(vec![daily_row("2026-03-02", "2026-03-02")]))
            .await;

        let summary = h.job(RetryPolicy::no_retries()).run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(h.closures.all().await[0].space_id, second);
    }

    #[tokio::test]
    async fn transient_query_failures_are_retried() {
        let h = Harness::new();
        let space_id = h.add_space().await;
        h.open_weekdays(space_id, &[1, 2, 3, 4, 5, 6, 7], 30).await;
        h.gateway
            .script_closures(Err(bookings_unab::UnabError::Timeout))
            .await;
        h.gateway
            .script_closures(Ok(vec![daily_row("2026-03-02", "2026-03-02")]))
            .await;

        let retry = RetryPolicy {
            max_retries: 1,
            initial_delay: StdDuration::from_millis(1),
            max_delay: StdDuration::from_millis(2),
            multiplier: 1.0,
        };
        let summary = h.job(retry).run().await.unwrap();

        assert_eq!(summary.failed, 0);
        assert_eq!(summary.processed, 1);
        assert_eq!(h.gateway.queries.lock().await.len(), 2);
    }
}
