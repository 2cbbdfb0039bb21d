//! Schedule configurations and price bands.

use crate::db_err;
use async_trait::async_trait;
use bookings_core::repository::{Result, ScheduleRepository};
use bookings_core::{
    ConfigurationId, PriceBand, RepositoryError, ScheduleConfiguration, ScheduleScope, SpaceId,
};
use chrono::{NaiveDate, NaiveTime};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// sqlx-backed [`ScheduleRepository`].
pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    /// Wraps a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_configuration(row: &PgRow) -> Result<ScheduleConfiguration> {
        let scope = match row.try_get::<Option<NaiveDate>, _>("scope_date").map_err(db_err)? {
            Some(date) => ScheduleScope::Date(date),
            None => {
                let weekday: i16 = row.try_get("scope_weekday").map_err(db_err)?;
                let weekday = u8::try_from(weekday)
                    .map_err(|_| RepositoryError::invalid("scope_weekday", weekday.to_string()))?;
                ScheduleScope::from_weekday_number(weekday)?
            }
        };
        let slot_minutes: Option<i32> = row.try_get("slot_minutes").map_err(db_err)?;
        let booking_open_days: i32 = row.try_get("booking_open_days").map_err(db_err)?;

        Ok(ScheduleConfiguration {
            id: ConfigurationId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?),
            space_id: SpaceId::from_uuid(row.try_get::<Uuid, _>("space_id").map_err(db_err)?),
            scope,
            slot_minutes: slot_minutes.and_then(|m| u32::try_from(m).ok()),
            booking_open_days: u32::try_from(booking_open_days).unwrap_or_default(),
            cancellation_lead_minutes: row.try_get("cancellation_lead_minutes").map_err(db_err)?,
            opening_hour: row.try_get("opening_hour").map_err(db_err)?,
        })
    }
}

const CONFIGURATION_COLUMNS: &str = "id, space_id, scope_date, scope_weekday, slot_minutes, \
     booking_open_days, cancellation_lead_minutes, opening_hour";

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn find_for_date(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
    ) -> Result<Option<ScheduleConfiguration>> {
        let row = sqlx::query(&format!(
            "SELECT {CONFIGURATION_COLUMNS} FROM schedule_configurations \
             WHERE space_id = $1 AND scope_date = $2"
        ))
        .bind(space_id.as_uuid())
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::row_to_configuration).transpose()
    }

    async fn find_for_weekday(
        &self,
        space_id: SpaceId,
        weekday: u8,
    ) -> Result<Option<ScheduleConfiguration>> {
        let row = sqlx::query(&format!(
            "SELECT {CONFIGURATION_COLUMNS} FROM schedule_configurations \
             WHERE space_id = $1 AND scope_weekday = $2"
        ))
        .bind(space_id.as_uuid())
        .bind(i16::from(weekday))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::row_to_configuration).transpose()
    }

    async fn price_bands(&self, configuration_id: ConfigurationId) -> Result<Vec<PriceBand>> {
        let rows = sqlx::query(
            "SELECT configuration_id, starts_at, ends_at, price, active \
             FROM price_bands WHERE configuration_id = $1 ORDER BY starts_at",
        )
        .bind(configuration_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                Ok(PriceBand {
                    configuration_id: ConfigurationId::from_uuid(
                        row.try_get::<Uuid, _>("configuration_id").map_err(db_err)?,
                    ),
                    starts_at: row.try_get::<NaiveTime, _>("starts_at").map_err(db_err)?,
                    ends_at: row.try_get::<NaiveTime, _>("ends_at").map_err(db_err)?,
                    price: row.try_get("price").map_err(db_err)?,
                    active: row.try_get("active").map_err(db_err)?,
                })
            })
            .collect()
    }
}
