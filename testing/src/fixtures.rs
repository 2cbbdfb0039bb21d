//! Fixture builders with sensible defaults.
//!
//! Each builder returns a fully-populated record; tests mutate the fields
//! they care about.

use bookings_core::{
    BillingIdentity, BillingKind, ClosureEvent, ClosureId, ClosureKind, ClosureOrigin,
    ConfigurationId, Payment, PaymentId, PaymentStatus, ReportState, RequesterId, Reservation,
    ReservationId, ReservationStatus, ScheduleConfiguration, ScheduleScope, Space, SpaceId,
    Subscription, SubscriptionId,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// A Monday used across the test suite.
#[must_use]
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap_or_default()
}

/// Shorthand for `NaiveTime::from_hms_opt(h, m, 0)`.
#[must_use]
pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

/// An active standard space carrying both external codes.
#[must_use]
pub fn space() -> Space {
    Space {
        id: SpaceId::new(),
        name: "Cancha 1".into(),
        building_code: Some("ED01".into()),
        space_code: Some("CANCHA-1".into()),
        category: "Deportes".into(),
        billing_kind: BillingKind::Standard,
        active: true,
    }
}

/// A Monday weekday configuration: opens 07:00, 60-minute slots, booking
/// opens 7 days ahead, 120-minute cancellation lead.
#[must_use]
pub fn schedule_config(space_id: SpaceId) -> ScheduleConfiguration {
    ScheduleConfiguration {
        id: ConfigurationId::new(),
        space_id,
        scope: ScheduleScope::Weekday(1),
        slot_minutes: Some(60),
        booking_open_days: 7,
        cancellation_lead_minutes: 120,
        opening_hour: "07:00".into(),
    }
}

/// An `inicial` reservation for the 14:00 slot on [`monday`].
#[must_use]
pub fn reservation(space_id: SpaceId, created_at: DateTime<Utc>) -> Reservation {
    Reservation {
        id: ReservationId::new(),
        space_id,
        configuration_id: ConfigurationId::new(),
        requester_id: RequesterId::new(),
        date: monday(),
        starts_at: t(14, 0),
        ends_at: t(15, 0),
        status: ReservationStatus::Inicial,
        price: Some(5000),
        external_event_code: None,
        external_person_id: None,
        has_ledger_movement: false,
        report: ReportState::default(),
        created_at,
        deleted_at: None,
    }
}

/// A `completada` subscription covering March 2026.
#[must_use]
pub fn subscription(space_id: SpaceId, created_at: DateTime<Utc>) -> Subscription {
    Subscription {
        id: SubscriptionId::new(),
        space_id,
        requester_id: RequesterId::new(),
        starts_on: monday(),
        ends_on: monday() + Duration::days(30),
        status: ReservationStatus::Completada,
        price: 45_000,
        external_event_code: None,
        external_person_id: None,
        report: ReportState::default(),
        created_at,
    }
}

/// A settled payment.
#[must_use]
pub fn payment_ok(amount: i64) -> Payment {
    Payment {
        id: PaymentId::new(),
        ticket_id: "TK-900".into(),
        amount,
        status: PaymentStatus::Ok,
    }
}

/// A payment stuck in a non-settled status.
#[must_use]
pub fn payment_pending(amount: i64) -> Payment {
    Payment {
        id: PaymentId::new(),
        ticket_id: "TK-901".into(),
        amount,
        status: PaymentStatus::Pending,
    }
}

/// A manual maintenance closure on [`monday`].
#[must_use]
pub fn closure(space_id: SpaceId, from: NaiveTime, to: NaiveTime) -> ClosureEvent {
    ClosureEvent {
        id: ClosureId::new(),
        space_id,
        date: monday(),
        starts_at: from,
        ends_at: to,
        description: "mantenimiento".into(),
        kind: ClosureKind::Maintenance,
        origin: ClosureOrigin::Manual,
        deleted_at: None,
    }
}

/// A complete billing identity.
#[must_use]
pub fn billing_identity(requester_id: RequesterId) -> BillingIdentity {
    BillingIdentity {
        requester_id,
        full_name: "Ana Soto".into(),
        document: "12345678-9".into(),
        email: "ana@example.edu".into(),
        address: "Av. República 237".into(),
        city_code: "33".into(),
        region_code: "13".into(),
    }
}
