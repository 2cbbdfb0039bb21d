//! Public-holiday calendar.
//!
//! The resolver asks "is this date a holiday?" once per availability lookup,
//! so the table is read through a per-year cache instead of hitting the
//! database every time. The holiday table itself is maintained out of band.

use crate::db_err;
use async_trait::async_trait;
use bookings_core::repository::{HolidayCalendar, Result};
use bookings_core::RepositoryError;
use chrono::{Datelike, NaiveDate};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// sqlx-backed [`HolidayCalendar`] with a per-year read-through cache.
pub struct PgHolidayCalendar {
    pool: PgPool,
    cache: RwLock<HashMap<i32, HashSet<NaiveDate>>>,
}

impl PgHolidayCalendar {
    /// Wraps a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn load_year(&self, year: i32) -> Result<HashSet<NaiveDate>> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| RepositoryError::invalid("year", year.to_string()))?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| RepositoryError::invalid("year", year.to_string()))?;

        let rows: Vec<(NaiveDate,)> =
            sqlx::query_as("SELECT date FROM holidays WHERE date BETWEEN $1 AND $2")
                .bind(first)
                .bind(last)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        tracing::debug!(year, holidays = rows.len(), "holiday year loaded");
        Ok(rows.into_iter().map(|(d,)| d).collect())
    }
}

#[async_trait]
impl HolidayCalendar for PgHolidayCalendar {
    async fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        let year = date.year();

        if let Some(days) = self.cache.read().await.get(&year) {
            return Ok(days.contains(&date));
        }

        let days = self.load_year(year).await?;
        let hit = days.contains(&date);
        self.cache.write().await.insert(year, days);
        Ok(hit)
    }
}
