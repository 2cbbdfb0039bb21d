//! Slot Availability Builder.
//!
//! Pure derivation of the bookable-slot calendar for one space-day: the
//! resolved configuration fixes the opening hour and slot length, price bands
//! attach prices, closures and existing bookings reduce availability.
//!
//! The builder has no side effects and is safe to call repeatedly for the
//! same inputs; the daily occupancy metric re-derives slot counts through the
//! same code path.

use crate::types::{ClosureEvent, PriceBand, ScheduleConfiguration};
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::Serialize;

/// Last bookable minute of the day; slots never span midnight.
const DAY_END_MINUTES: u32 = 23 * 60 + 59;

/// Opening hour used when the configured value cannot be parsed.
const FALLBACK_OPENING_MINUTES: u32 = 7 * 60;

/// Availability of a single slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SlotStatus {
    /// Bookable.
    Available,
    /// Taken by a confirmed reservation.
    Reserved,
    /// Blocked by a maintenance/closure window.
    Unavailable,
}

impl SlotStatus {
    /// Legacy string representation used by the booking UI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "disponible",
            Self::Reserved => "reservada",
            Self::Unavailable => "no_disponible",
        }
    }
}

/// A discrete bookable time window derived from a configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Slot {
    /// Slot start.
    pub starts_at: NaiveTime,
    /// Slot end; the final slot may be truncated at 23:59.
    pub ends_at: NaiveTime,
    /// Price from the matching active band; `None` renders as free.
    pub price: Option<i64>,
    /// Availability after closures and bookings are applied.
    pub status: SlotStatus,
    /// Annotation from an overlapping closure (blocking or notice).
    pub note: Option<String>,
}

impl Slot {
    /// Styling hint for the UI: priced slots render differently.
    #[must_use]
    pub const fn is_priced(&self) -> bool {
        self.price.is_some()
    }
}

/// Builds the ordered slot sequence for `config` on `date`.
///
/// `closures` may contain events for other dates or soft-deleted ones; both
/// are ignored. `booked_starts` are the start times of confirmed reservations
/// for the same space-day, supplied by the caller.
///
/// A malformed opening hour falls back to 07:00 with a warning; a missing
/// slot duration falls back to 60 minutes. The builder never fails.
#[must_use]
pub fn build_availability(
    config: &ScheduleConfiguration,
    bands: &[PriceBand],
    closures: &[ClosureEvent],
    booked_starts: &[NaiveTime],
    date: NaiveDate,
) -> Vec<Slot> {
    let slot_minutes = config.effective_slot_minutes();
    let mut cursor = opening_minutes(&config.opening_hour);
    let mut slots = Vec::new();

    let day_closures: Vec<&ClosureEvent> = closures
        .iter()
        .filter(|c| c.date == date && c.is_active())
        .collect();

    while cursor < DAY_END_MINUTES {
        let end = (cursor + slot_minutes).min(DAY_END_MINUTES);
        let starts_at = minutes_to_time(cursor);
        let ends_at = minutes_to_time(end);

        let price = bands.iter().find(|b| b.covers(starts_at)).map(|b| b.price);

        let mut status = if booked_starts.contains(&starts_at) {
            SlotStatus::Reserved
        } else {
            SlotStatus::Available
        };
        let mut note = None;

        for closure in &day_closures {
            if closure.overlaps(starts_at, ends_at) {
                if closure.kind.blocks() {
                    status = SlotStatus::Unavailable;
                }
                note = Some(closure.description.clone());
            }
        }

        slots.push(Slot {
            starts_at,
            ends_at,
            price,
            status,
            note,
        });
        cursor = end;
    }

    slots
}

/// Aggregate slot counts for one space-day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OccupancySummary {
    /// All slots generated for the day.
    pub total: usize,
    /// Bookable slots.
    pub available: usize,
    /// Slots taken by confirmed reservations.
    pub reserved: usize,
    /// Slots blocked by closures.
    pub unavailable: usize,
}

/// Re-derives the daily occupancy counts from a slot sequence.
#[must_use]
pub fn occupancy(slots: &[Slot]) -> OccupancySummary {
    let mut summary = OccupancySummary {
        total: slots.len(),
        ..OccupancySummary::default()
    };
    for slot in slots {
        match slot.status {
            SlotStatus::Available => summary.available += 1,
            SlotStatus::Reserved => summary.reserved += 1,
            SlotStatus::Unavailable => summary.unavailable += 1,
        }
    }
    summary
}

fn opening_minutes(opening_hour: &str) -> u32 {
    match NaiveTime::parse_from_str(opening_hour, "%H:%M") {
        Ok(time) => time.hour() * 60 + time.minute(),
        Err(_) => {
            tracing::warn!(
                opening_hour = opening_hour,
                "malformed opening hour, falling back to 07:00"
            );
            FALLBACK_OPENING_MINUTES
        }
    }
}

fn minutes_to_time(minutes: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{
        ClosureId, ClosureKind, ClosureOrigin, ConfigurationId, ScheduleScope, SpaceId,
    };
    use chrono::Utc;
    use proptest::prelude::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn config(opening_hour: &str, slot_minutes: Option<u32>) -> ScheduleConfiguration {
        ScheduleConfiguration {
            id: ConfigurationId::new(),
            space_id: SpaceId::new(),
            scope: ScheduleScope::Weekday(1),
            slot_minutes,
            booking_open_days: 7,
            cancellation_lead_minutes: 120,
            opening_hour: opening_hour.into(),
        }
    }

    fn band(config_id: ConfigurationId, from: NaiveTime, to: NaiveTime, price: i64) -> PriceBand {
        PriceBand {
            configuration_id: config_id,
            starts_at: from,
            ends_at: to,
            price,
            active: true,
        }
    }

    fn closure(kind: ClosureKind, from: NaiveTime, to: NaiveTime) -> ClosureEvent {
        ClosureEvent {
            id: ClosureId::new(),
            space_id: SpaceId::new(),
            date: date(),
            starts_at: from,
            ends_at: to,
            description: "mantenimiento cancha".into(),
            kind,
            origin: ClosureOrigin::Manual,
            deleted_at: None,
        }
    }

    #[test]
    fn worked_example_from_the_booking_rules() {
        // Opens 07:00, 60-minute slots, band 07:00-09:00 at 5000, maintenance
        // closure 08:00-08:30.
        let config = config("07:00", Some(60));
        let bands = vec![band(config.id, t(7, 0), t(9, 0), 5000)];
        let closures = vec![closure(ClosureKind::Maintenance, t(8, 0), t(8, 30))];

        let slots = build_availability(&config, &bands, &closures, &[], date());

        assert_eq!(slots[0].starts_at, t(7, 0));
        assert_eq!(slots[0].price, Some(5000));
        assert_eq!(slots[0].status, SlotStatus::Available);

        assert_eq!(slots[1].starts_at, t(8, 0));
        assert_eq!(slots[1].price, Some(5000));
        assert_eq!(slots[1].status, SlotStatus::Unavailable);
        assert!(slots[1].note.is_some());

        assert_eq!(slots[2].starts_at, t(9, 0));
        assert_eq!(slots[2].price, None);
        assert_eq!(slots[2].status, SlotStatus::Available);

        let last = slots.last().unwrap();
        assert!(last.ends_at <= t(23, 59));
    }

    #[test]
    fn final_slot_truncated_at_day_end() {
        let config = config("22:30", Some(60));
        let slots = build_availability(&config, &[], &[], &[], date());

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].starts_at, t(23, 30));
        assert_eq!(slots[1].ends_at, t(23, 59));
    }

    #[test]
    fn malformed_opening_hour_falls_back() {
        let config = config("soon-ish", Some(60));
        let slots = build_availability(&config, &[], &[], &[], date());
        assert_eq!(slots[0].starts_at, t(7, 0));
    }

    #[test]
    fn missing_slot_minutes_defaults_to_sixty() {
        let config = config("07:00", None);
        let slots = build_availability(&config, &[], &[], &[], date());
        assert_eq!(slots[0].ends_at, t(8, 0));
    }

    #[test]
    fn booked_start_marks_slot_reserved() {
        let config = config("07:00", Some(60));
        let slots = build_availability(&config, &[], &[], &[t(9, 0)], date());
        assert_eq!(slots[2].status, SlotStatus::Reserved);
        assert_eq!(slots[0].status, SlotStatus::Available);
    }

    #[test]
    fn notice_closure_annotates_but_keeps_slot_bookable() {
        let config = config("07:00", Some(60));
        let closures = vec![closure(ClosureKind::Notice, t(7, 0), t(8, 0))];
        let slots = build_availability(&config, &[], &closures, &[], date());

        assert_eq!(slots[0].status, SlotStatus::Available);
        assert_eq!(slots[0].note.as_deref(), Some("mantenimiento cancha"));
    }

    #[test]
    fn soft_deleted_and_other_day_closures_ignored() {
        let config = config("07:00", Some(60));
        let mut deleted = closure(ClosureKind::Closed, t(7, 0), t(8, 0));
        deleted.deleted_at = Some(Utc::now());
        let mut other_day = closure(ClosureKind::Closed, t(7, 0), t(8, 0));
        other_day.date = date().succ_opt().unwrap();

        let slots = build_availability(&config, &[], &[deleted, other_day], &[], date());
        assert_eq!(slots[0].status, SlotStatus::Available);
    }

    #[test]
    fn inactive_band_does_not_price() {
        let config = config("07:00", Some(60));
        let mut inactive = band(config.id, t(7, 0), t(9, 0), 5000);
        inactive.active = false;

        let slots = build_availability(&config, &[inactive], &[], &[], date());
        assert_eq!(slots[0].price, None);
    }

    #[test]
    fn occupancy_rederives_counts() {
        let config = config("07:00", Some(60));
        let closures = vec![closure(ClosureKind::Maintenance, t(8, 0), t(8, 30))];
        let slots = build_availability(&config, &[], &closures, &[t(9, 0)], date());

        let summary = occupancy(&slots);
        assert_eq!(summary.total, slots.len());
        assert_eq!(summary.reserved, 1);
        assert_eq!(summary.unavailable, 1);
        assert_eq!(
            summary.available,
            summary.total - summary.reserved - summary.unavailable
        );
    }

    proptest! {
        #[test]
        fn slots_are_contiguous_ordered_and_equal_length(
            open_hour in 0u32..24,
            open_minute in 0u32..60,
            slot_minutes in 15u32..=120,
        ) {
            let config = config(
                &format!("{open_hour:02}:{open_minute:02}"),
                Some(slot_minutes),
            );
            let slots = build_availability(&config, &[], &[], &[], date());

            for pair in slots.windows(2) {
                // contiguous and strictly ordered
                prop_assert_eq!(pair[0].ends_at, pair[1].starts_at);
                prop_assert!(pair[0].starts_at < pair[1].starts_at);
                // equal length except possibly the final slot
                let len = pair[0].ends_at.signed_duration_since(pair[0].starts_at);
                prop_assert_eq!(len.num_minutes(), i64::from(slot_minutes));
            }
            if let Some(last) = slots.last() {
                prop_assert!(last.ends_at <= t(23, 59));
                prop_assert!(last.starts_at < last.ends_at);
            }
        }

        #[test]
        fn builder_is_idempotent(slot_minutes in 15u32..=120) {
            let config = config("07:00", Some(slot_minutes));
            let bands = vec![band(config.id, t(7, 0), t(9, 0), 5000)];
            let closures = vec![closure(ClosureKind::Maintenance, t(8, 0), t(8, 30))];

            let first = build_availability(&config, &bands, &closures, &[t(10, 0)], date());
            let second = build_availability(&config, &bands, &closures, &[t(10, 0)], date());
            prop_assert_eq!(first, second);
        }
    }
}
