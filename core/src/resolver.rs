//! Configuration Resolver.
//!
//! Given a space and a date, finds the single schedule configuration in
//! force. Resolution order, first match wins:
//!
//! 1. configuration scoped exactly to the date;
//! 2. on public holidays, the holiday scope (weekday 8);
//! 3. the ISO weekday scope (1–7).
//!
//! No match means "space closed that day" and resolves to `None`; callers
//! must not treat it as an error.

use crate::repository::{HolidayCalendar, Result, ScheduleRepository};
use crate::types::{ScheduleConfiguration, SpaceId};
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

/// Resolves the applicable schedule configuration for (space, date).
#[derive(Clone)]
pub struct ConfigurationResolver {
    schedules: Arc<dyn ScheduleRepository>,
    holidays: Arc<dyn HolidayCalendar>,
}

impl ConfigurationResolver {
    /// Creates a resolver over the given repositories.
    #[must_use]
    pub fn new(schedules: Arc<dyn ScheduleRepository>, holidays: Arc<dyn HolidayCalendar>) -> Self {
        Self {
            schedules,
            holidays,
        }
    }

    /// The configuration governing `space_id` on `date`, if the space is
    /// open that day.
    ///
    /// # Errors
    ///
    /// Propagates repository and holiday-calendar failures. "No
    /// configuration" is `Ok(None)`, never an error.
    pub async fn resolve(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
    ) -> Result<Option<ScheduleConfiguration>> {
        if let Some(config) = self.schedules.find_for_date(space_id, date).await? {
            return Ok(Some(config));
        }

        if self.holidays.is_holiday(date).await? {
            if let Some(config) = self.schedules.find_for_weekday(space_id, 8).await? {
                return Ok(Some(config));
            }
        }

        let weekday = u8::try_from(date.weekday().number_from_monday()).unwrap_or(1);
        self.schedules.find_for_weekday(space_id, weekday).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{ConfigurationId, PriceBand, ScheduleScope};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    struct FakeSchedules {
        configs: Vec<ScheduleConfiguration>,
        lookups: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ScheduleRepository for FakeSchedules {
        async fn find_for_date(
            &self,
            space_id: SpaceId,
            date: NaiveDate,
        ) -> Result<Option<ScheduleConfiguration>> {
            self.lookups.lock().await.push(format!("date:{date}"));
            Ok(self
                .configs
                .iter()
                .find(|c| c.space_id == space_id && c.scope == ScheduleScope::Date(date))
                .cloned())
        }

        async fn find_for_weekday(
            &self,
            space_id: SpaceId,
            weekday: u8,
        ) -> Result<Option<ScheduleConfiguration>> {
            self.lookups.lock().await.push(format!("weekday:{weekday}"));
            Ok(self
                .configs
                .iter()
                .find(|c| {
                    c.space_id == space_id && c.scope.weekday_number() == Some(weekday)
                })
                .cloned())
        }

        async fn price_bands(&self, _configuration_id: ConfigurationId) -> Result<Vec<PriceBand>> {
            Ok(Vec::new())
        }
    }

    struct FakeHolidays {
        holidays: HashSet<NaiveDate>,
    }

    #[async_trait]
    impl HolidayCalendar for FakeHolidays {
        async fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
            Ok(self.holidays.contains(&date))
        }
    }

    fn config(space_id: SpaceId, scope: ScheduleScope) -> ScheduleConfiguration {
        ScheduleConfiguration {
            id: ConfigurationId::new(),
            space_id,
            scope,
            slot_minutes: Some(60),
            booking_open_days: 7,
            cancellation_lead_minutes: 120,
            opening_hour: "07:00".into(),
        }
    }

    fn resolver(
        configs: Vec<ScheduleConfiguration>,
        holidays: HashSet<NaiveDate>,
    ) -> ConfigurationResolver {
        ConfigurationResolver::new(
            Arc::new(FakeSchedules {
                configs,
                lookups: Mutex::new(Vec::new()),
            }),
            Arc::new(FakeHolidays { holidays }),
        )
    }

    // 2026-03-02 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[tokio::test]
    async fn date_scope_beats_holiday_and_weekday() {
        let space = SpaceId::new();
        let date_config = config(space, ScheduleScope::Date(monday()));
        let expected = date_config.id;
        let resolver = resolver(
            vec![
                config(space, ScheduleScope::Weekday(1)),
                config(space, ScheduleScope::Holiday),
                date_config,
            ],
            HashSet::from([monday()]),
        );

        let resolved = resolver.resolve(space, monday()).await.unwrap().unwrap();
        assert_eq!(resolved.id, expected);
    }

    #[tokio::test]
    async fn holiday_scope_beats_weekday() {
        let space = SpaceId::new();
        let holiday_config = config(space, ScheduleScope::Holiday);
        let expected = holiday_config.id;
        let resolver = resolver(
            vec![config(space, ScheduleScope::Weekday(1)), holiday_config],
            HashSet::from([monday()]),
        );

        let resolved = resolver.resolve(space, monday()).await.unwrap().unwrap();
        assert_eq!(resolved.id, expected);
    }

    #[tokio::test]
    async fn falls_back_to_iso_weekday() {
        let space = SpaceId::new();
        let weekday_config = config(space, ScheduleScope::Weekday(1));
        let expected = weekday_config.id;
        let resolver = resolver(vec![weekday_config], HashSet::new());

        let resolved = resolver.resolve(space, monday()).await.unwrap().unwrap();
        assert_eq!(resolved.id, expected);
    }

    #[tokio::test]
    async fn no_match_means_closed_not_error() {
        let space = SpaceId::new();
        let resolver = resolver(Vec::new(), HashSet::new());

        assert!(resolver.resolve(space, monday()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn holiday_tier_skipped_on_ordinary_days() {
        let space = SpaceId::new();
        // Only a holiday config exists, but the date is no holiday: closed.
        let resolver = resolver(vec![config(space, ScheduleScope::Holiday)], HashSet::new());

        assert!(resolver.resolve(space, monday()).await.unwrap().is_none());
    }
}
