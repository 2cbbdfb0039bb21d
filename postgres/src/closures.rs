//! Closure events.

use crate::db_err;
use async_trait::async_trait;
use bookings_core::repository::{ClosureRepository, Result};
use bookings_core::{ClosureEvent, ClosureId, ClosureKind, ClosureOrigin, RepositoryError, SpaceId};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// sqlx-backed [`ClosureRepository`].
pub struct PgClosureRepository {
    pool: PgPool,
}

impl PgClosureRepository {
    /// Wraps a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_closure(row: &PgRow) -> Result<ClosureEvent> {
        let kind: String = row.try_get("kind").map_err(db_err)?;
        let origin: String = row.try_get("origin").map_err(db_err)?;

        Ok(ClosureEvent {
            id: ClosureId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?),
            space_id: SpaceId::from_uuid(row.try_get::<Uuid, _>("space_id").map_err(db_err)?),
            date: row.try_get("date").map_err(db_err)?,
            starts_at: row.try_get("starts_at").map_err(db_err)?,
            ends_at: row.try_get("ends_at").map_err(db_err)?,
            description: row.try_get("description").map_err(db_err)?,
            kind: ClosureKind::parse(&kind)?,
            origin: ClosureOrigin::parse(&origin)?,
            deleted_at: row.try_get("deleted_at").map_err(db_err)?,
        })
    }
}

#[async_trait]
impl ClosureRepository for PgClosureRepository {
    async fn active_for_space_on(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
    ) -> Result<Vec<ClosureEvent>> {
        let rows = sqlx::query(
            "SELECT id, space_id, date, starts_at, ends_at, description, kind, origin, deleted_at \
             FROM closure_events \
             WHERE space_id = $1 AND date = $2 AND deleted_at IS NULL \
             ORDER BY starts_at",
        )
        .bind(space_id.as_uuid())
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_closure).collect()
    }

    async fn exists_matching(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
        starts_at: NaiveTime,
        ends_at: NaiveTime,
    ) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                SELECT 1 FROM closure_events \
                WHERE space_id = $1 AND date = $2 AND starts_at = $3 \
                  AND ends_at <= $4 AND deleted_at IS NULL)",
        )
        .bind(space_id.as_uuid())
        .bind(date)
        .bind(starts_at)
        .bind(ends_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(exists)
    }

    async fn insert(&self, closure: &ClosureEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO closure_events \
             (id, space_id, date, starts_at, ends_at, description, kind, origin, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(closure.id.as_uuid())
        .bind(closure.space_id.as_uuid())
        .bind(closure.date)
        .bind(closure.starts_at)
        .bind(closure.ends_at)
        .bind(&closure.description)
        .bind(closure.kind.as_str())
        .bind(closure.origin.as_str())
        .bind(closure.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(
            closure_id = %closure.id,
            space_id = %closure.space_id,
            date = %closure.date,
            origin = closure.origin.as_str(),
            "closure event inserted"
        );
        Ok(())
    }

    async fn soft_delete(&self, id: ClosureId, now: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE closure_events SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn restore(&self, id: ClosureId) -> Result<()> {
        let result = sqlx::query("UPDATE closure_events SET deleted_at = NULL WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
