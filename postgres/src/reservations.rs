//! Reservations and their reconciliation bookkeeping.
//!
//! The cancel and failure-bookkeeping statements are single guarded UPDATEs,
//! so concurrent job runs and request handlers cannot interleave a stale
//! status write.

use crate::db_err;
use async_trait::async_trait;
use bookings_core::repository::{ReservationRepository, Result};
use bookings_core::{
    ConfigurationId, Payment, PaymentId, PaymentStatus, ReportState, RepositoryError, RequesterId,
    Reservation, ReservationId, ReservationStatus, SpaceId, MAX_ERROR_LEN,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// sqlx-backed [`ReservationRepository`].
pub struct PgReservationRepository {
    pool: PgPool,
}

const RESERVATION_COLUMNS: &str = "id, space_id, configuration_id, requester_id, date, \
     starts_at, ends_at, status, price, external_event_code, external_person_id, \
     has_ledger_movement, reported, report_failure_count, report_last_error, \
     created_at, deleted_at";

impl PgReservationRepository {
    /// Wraps a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_reservation(row: &PgRow) -> Result<Reservation> {
        let status: String = row.try_get("status").map_err(db_err)?;
        let failure_count: i32 = row.try_get("report_failure_count").map_err(db_err)?;

        Ok(Reservation {
            id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?),
            space_id: SpaceId::from_uuid(row.try_get::<Uuid, _>("space_id").map_err(db_err)?),
            configuration_id: ConfigurationId::from_uuid(
                row.try_get::<Uuid, _>("configuration_id").map_err(db_err)?,
            ),
            requester_id: RequesterId::from_uuid(
                row.try_get::<Uuid, _>("requester_id").map_err(db_err)?,
            ),
            date: row.try_get("date").map_err(db_err)?,
            starts_at: row.try_get("starts_at").map_err(db_err)?,
            ends_at: row.try_get("ends_at").map_err(db_err)?,
            status: ReservationStatus::parse(&status)?,
            price: row.try_get("price").map_err(db_err)?,
            external_event_code: row.try_get("external_event_code").map_err(db_err)?,
            external_person_id: row.try_get("external_person_id").map_err(db_err)?,
            has_ledger_movement: row.try_get("has_ledger_movement").map_err(db_err)?,
            report: ReportState {
                reported: row.try_get("reported").map_err(db_err)?,
                failure_count: u32::try_from(failure_count).unwrap_or_default(),
                last_error: row.try_get("report_last_error").map_err(db_err)?,
            },
            created_at: row.try_get("created_at").map_err(db_err)?,
            deleted_at: row.try_get("deleted_at").map_err(db_err)?,
        })
    }
}

pub(crate) fn row_to_payment(row: &PgRow) -> Result<Payment> {
    let status: String = row.try_get("status").map_err(db_err)?;
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?),
        ticket_id: row.try_get("ticket_id").map_err(db_err)?,
        amount: row.try_get("amount").map_err(db_err)?,
        status: PaymentStatus::parse(&status)?,
    })
}

pub(crate) fn non_settled_statuses() -> Vec<String> {
    PaymentStatus::non_settled()
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[allow(clippy::cast_possible_wrap)] // batch limits are far below i64::MAX
pub(crate) const fn limit_param(limit: usize) -> i64 {
    limit as i64
}

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    async fn find(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::row_to_reservation).transpose()
    }

    async fn booked_starts(&self, space_id: SpaceId, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        let rows: Vec<(NaiveTime,)> = sqlx::query_as(
            "SELECT starts_at FROM reservations \
             WHERE space_id = $1 AND date = $2 AND status <> 'cancelada' \
             ORDER BY starts_at",
        )
        .bind(space_id.as_uuid())
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    async fn expiry_candidates(
        &self,
        on_or_after: NaiveDate,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations r \
             WHERE r.status = 'inicial' \
               AND r.date >= $1 \
               AND r.created_at < $2 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM payments p \
                   WHERE p.reservation_id = r.id AND p.status <> ALL($3)) \
             ORDER BY r.created_at \
             LIMIT $4"
        ))
        .bind(on_or_after)
        .bind(created_before)
        .bind(non_settled_statuses())
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_reservation).collect()
    }

    async fn cancel(&self, id: ReservationId, now: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE reservations SET status = 'cancelada', deleted_at = $2 \
             WHERE id = $1 AND status <> 'cancelada'",
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(reservation_id = %id, "reservation cancelled and soft-deleted");
        Ok(())
    }

    async fn unreported(&self, threshold: u32, limit: usize) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations r \
             WHERE r.reported = FALSE \
               AND r.report_failure_count < $1 \
               AND r.status IN ('pagada', 'completada') \
               AND (EXISTS ( \
                        SELECT 1 FROM payments p \
                        WHERE p.reservation_id = r.id AND p.status = 'OK') \
                    OR (r.status = 'completada' AND NOT EXISTS ( \
                        SELECT 1 FROM payments p WHERE p.reservation_id = r.id))) \
             ORDER BY r.created_at \
             LIMIT $2"
        ))
        .bind(i64::from(threshold))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_reservation).collect()
    }

    async fn mark_reported(
        &self,
        id: ReservationId,
        external_person_id: Option<&str>,
        event_code: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE reservations \
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

    async fn record_failure(&self, id: ReservationId, message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE reservations \
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

    async fn quarantined(&self, threshold: u32, limit: usize) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE reported = FALSE AND report_failure_count >= $1 \
             ORDER BY created_at \
             LIMIT $2"
        ))
        .bind(i64::from(threshold))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_reservation).collect()
    }

    async fn payment_for(&self, id: ReservationId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT id, ticket_id, amount, status FROM payments \
             WHERE reservation_id = $1 \
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
