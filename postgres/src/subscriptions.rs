//! Subscriptions ("mensualidades").

use crate::db_err;
use crate::reservations::{limit_param, row_to_payment};
use async_trait::async_trait;
use bookings_core::repository::{Result, SubscriptionRepository};
use bookings_core::{
    Payment, ReportState, RequesterId, ReservationStatus, SpaceId, Subscription, SubscriptionId,
    MAX_ERROR_LEN,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// sqlx-backed [`SubscriptionRepository`].
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

const SUBSCRIPTION_COLUMNS: &str = "id, space_id, requester_id, starts_on, ends_on, status, \
     price, external_event_code, external_person_id, reported, report_failure_count, \
     report_last_error, created_at";

impl PgSubscriptionRepository {
    /// Wraps a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_subscription(row: &PgRow) -> Result<Subscription> {
        let status: String = row.try_get("status").map_err(db_err)?;
        let failure_count: i32 = row.try_get("report_failure_count").map_err(db_err)?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?),
            space_id: SpaceId::from_uuid(row.try_get::<Uuid, _>("space_id").map_err(db_err)?),
            requester_id: RequesterId::from_uuid(
                row.try_get::<Uuid, _>("requester_id").map_err(db_err)?,
            ),
            starts_on: row.try_get("starts_on").map_err(db_err)?,
            ends_on: row.try_get("ends_on").map_err(db_err)?,
            status: ReservationStatus::parse(&status)?,
            price: row.try_get("price").map_err(db_err)?,
            external_event_code: row.try_get("external_event_code").map_err(db_err)?,
            external_person_id: row.try_get("external_person_id").map_err(db_err)?,
            report: ReportState {
                reported: row.try_get("reported").map_err(db_err)?,
                failure_count: u32::try_from(failure_count).unwrap_or_default(),
                last_error: row.try_get("report_last_error").map_err(db_err)?,
            },
            created_at: row.try_get("created_at").map_err(db_err)?,
        })
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn unreported(&self, threshold: u32, limit: usize) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions s \
             WHERE s.reported = FALSE \
               AND s.report_failure_count < $1 \
               AND s.status IN ('pagada', 'completada') \
               AND EXISTS ( \
                   SELECT 1 FROM payments p \
                   WHERE p.subscription_id = s.id AND p.status = 'OK') \
             ORDER BY s.created_at \
             LIMIT $2"
        ))
        .bind(i64::from(threshold))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_subscription).collect()
    }

    async fn mark_reported(
        &self,
        id: SubscriptionId,
        external_person_id: Option<&str>,
        event_code: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE subscriptions \
             SET reported = TRUE, \
                 report_last_error = NULL, \
                 external_person_id = COALESCE($2, external_person_id), \
                 external_event_code = COALESCE($3, external_event_code) \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(external_person_id)
        .bind(event_code)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn record_failure(&self, id: SubscriptionId, message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE subscriptions \
             SET report_failure_count = report_failure_count + 1, \
                 report_last_error = LEFT($2, $3) \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(message)
        .bind(i32::try_from(MAX_ERROR_LEN).unwrap_or(255))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn quarantined(&self, threshold: u32, limit: usize) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE reported = FALSE AND report_failure_count >= $1 \
             ORDER BY created_at \
             LIMIT $2"
        ))
        .bind(i64::from(threshold))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_subscription).collect()
    }

    async fn payment_for(&self, id: SubscriptionId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT id, ticket_id, amount, status FROM payments \
             WHERE subscription_id = $1 \
             ORDER BY created_at DESC \
             LIMIT 1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_payment).transpose()
    }
}
