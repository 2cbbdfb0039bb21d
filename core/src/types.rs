//! Domain entities and value objects for the booking engine.
//!
//! Naming follows the institution's ledger: status strings and the
//! reconciliation bookkeeping columns keep their legacy Spanish spellings on
//! the wire and in the database, while the Rust types stay strongly typed.

use crate::error::RepositoryError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length persisted for `ultimo_error_reporte`.
pub const MAX_ERROR_LEN: usize = 255;

/// Reporting attempts allowed before a record is quarantined.
pub const QUARANTINE_THRESHOLD: u32 = 5;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing `Uuid`.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner `Uuid`.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a bookable space.
    SpaceId
);
uuid_id!(
    /// Unique identifier for a schedule configuration.
    ConfigurationId
);
uuid_id!(
    /// Unique identifier for a closure event ("novedad").
    ClosureId
);
uuid_id!(
    /// Unique identifier for a reservation.
    ReservationId
);
uuid_id!(
    /// Unique identifier for a subscription ("mensualidad").
    SubscriptionId
);
uuid_id!(
    /// Unique identifier for the requesting identity.
    RequesterId
);
uuid_id!(
    /// Unique identifier for a payment record.
    PaymentId
);

// ============================================================================
// Space
// ============================================================================

/// How a space is billed against the external system.
///
/// Explicit attribute set at catalog-configuration time; replaces the old
/// "gimnasio" name-substring heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingKind {
    /// Per-slot reservations reported through the standard channel.
    Standard,
    /// Gym/monthly billing, excluded from standard reservation reporting.
    Gym,
}

impl BillingKind {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Gym => "gym",
        }
    }

    /// Parses the database string representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the string does not name a known billing kind.
    pub fn parse(s: &str) -> Result<Self, RepositoryError> {
        match s {
            "standard" => Ok(Self::Standard),
            "gym" => Ok(Self::Gym),
            other => Err(RepositoryError::invalid("billing_kind", other)),
        }
    }
}

/// A bookable physical resource (court, room, gym).
///
/// Owned by the catalog subsystem; read-only within this engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Space {
    /// Space identifier.
    pub id: SpaceId,
    /// Display name.
    pub name: String,
    /// Building code used by the external system, when assigned.
    pub building_code: Option<String>,
    /// Catalog code used by the external system, when assigned.
    pub space_code: Option<String>,
    /// Catalog category name.
    pub category: String,
    /// Billing classification.
    pub billing_kind: BillingKind,
    /// Whether the space is active in the catalog.
    pub active: bool,
}

impl Space {
    /// True when the space carries both codes the external system requires.
    #[must_use]
    pub fn has_external_codes(&self) -> bool {
        self.building_code.is_some() && self.space_code.is_some()
    }
}

// ============================================================================
// Schedule configuration
// ============================================================================

/// Scope of a schedule configuration.
///
/// A configuration applies either to one exact calendar date or to a weekday
/// number (1–7 ISO, with 8 reserved for public holidays). A date-scoped
/// configuration always takes precedence over a weekday-scoped one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleScope {
    /// Applies to exactly one calendar date.
    Date(NaiveDate),
    /// Applies to an ISO weekday, 1 (Monday) through 7 (Sunday).
    Weekday(u8),
    /// Applies to public holidays (stored as weekday 8).
    Holiday,
}

impl ScheduleScope {
    /// The weekday number persisted for this scope, if weekday-scoped.
    #[must_use]
    pub const fn weekday_number(&self) -> Option<u8> {
        match self {
            Self::Date(_) => None,
            Self::Weekday(n) => Some(*n),
            Self::Holiday => Some(8),
        }
    }

    /// Builds a weekday scope from the persisted number.
    ///
    /// # Errors
    ///
    /// Returns an error for numbers outside 1..=8.
    pub fn from_weekday_number(n: u8) -> Result<Self, RepositoryError> {
        match n {
            1..=7 => Ok(Self::Weekday(n)),
            8 => Ok(Self::Holiday),
            other => Err(RepositoryError::invalid("weekday", other.to_string())),
        }
    }
}

/// The rules governing bookability of a space on a date or weekday.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleConfiguration {
    /// Configuration identifier.
    pub id: ConfigurationId,
    /// Space the configuration belongs to.
    pub space_id: SpaceId,
    /// Date or weekday scope. At most one configuration exists per
    /// (space, date) and per (space, weekday).
    pub scope: ScheduleScope,
    /// Slot duration in minutes. `None` falls back to 60.
    pub slot_minutes: Option<u32>,
    /// Days ahead of a slot's date at which booking opens.
    pub booking_open_days: u32,
    /// Minimum minutes between cancellation and the slot start.
    pub cancellation_lead_minutes: i64,
    /// Opening hour as `HH:MM`. Malformed values fall back at build time.
    pub opening_hour: String,
}

impl ScheduleConfiguration {
    /// Effective slot duration in minutes.
    #[must_use]
    pub fn effective_slot_minutes(&self) -> u32 {
        self.slot_minutes.filter(|m| *m > 0).unwrap_or(60)
    }
}

/// A priced sub-range of a configuration's day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceBand {
    /// Configuration the band belongs to.
    pub configuration_id: ConfigurationId,
    /// Inclusive start of the band.
    pub starts_at: NaiveTime,
    /// Exclusive end of the band.
    pub ends_at: NaiveTime,
    /// Price for slots starting inside the band.
    pub price: i64,
    /// Inactive bands are ignored by the availability builder.
    pub active: bool,
}

impl PriceBand {
    /// True when the band prices a slot starting at `start`.
    #[must_use]
    pub fn covers(&self, start: NaiveTime) -> bool {
        self.active && self.starts_at <= start && start < self.ends_at
    }
}

// ============================================================================
// Closures ("novedades")
// ============================================================================

/// What a closure event means for overlapping slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClosureKind {
    /// Maintenance window; overlapping slots become unavailable.
    Maintenance,
    /// External-calendar closure; overlapping slots become unavailable.
    Closed,
    /// Informational only; overlapping slots stay bookable but annotated.
    Notice,
}

impl ClosureKind {
    /// Whether this closure removes availability.
    #[must_use]
    pub const fn blocks(&self) -> bool {
        matches!(self, Self::Maintenance | Self::Closed)
    }

    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Maintenance => "maintenance",
            Self::Closed => "closed",
            Self::Notice => "notice",
        }
    }

    /// Parses the database string representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the string does not name a known kind.
    pub fn parse(s: &str) -> Result<Self, RepositoryError> {
        match s {
            "maintenance" => Ok(Self::Maintenance),
            "closed" => Ok(Self::Closed),
            "notice" => Ok(Self::Notice),
            other => Err(RepositoryError::invalid("closure_kind", other)),
        }
    }
}

/// Where a closure event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClosureOrigin {
    /// Created by staff.
    Manual,
    /// Created by the external closure-sync job.
    ExternalSync,
}

impl ClosureOrigin {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::ExternalSync => "external_sync",
        }
    }

    /// Parses the database string representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the string does not name a known origin.
    pub fn parse(s: &str) -> Result<Self, RepositoryError> {
        match s {
            "manual" => Ok(Self::Manual),
            "external_sync" => Ok(Self::ExternalSync),
            other => Err(RepositoryError::invalid("closure_origin", other)),
        }
    }
}

/// A declared unavailability or notice window for a space on one date.
///
/// Multi-day upstream records are expanded into one event per calendar day at
/// ingest, so duplicate detection stays an exact (space, date, start, end)
/// match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureEvent {
    /// Closure identifier.
    pub id: ClosureId,
    /// Affected space.
    pub space_id: SpaceId,
    /// The calendar day the closure applies to.
    pub date: NaiveDate,
    /// Start of the affected time range.
    pub starts_at: NaiveTime,
    /// End of the affected time range.
    pub ends_at: NaiveTime,
    /// Free-text description shown to bookers.
    pub description: String,
    /// Closure semantics.
    pub kind: ClosureKind,
    /// Provenance.
    pub origin: ClosureOrigin,
    /// Soft-delete timestamp; deleted closures no longer affect slots.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ClosureEvent {
    /// True unless the closure has been soft-deleted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// True when the closure's time range overlaps `[start, end)`.
    ///
    /// Matches if the slot starts inside the closure, ends inside it, or the
    /// closure lies fully inside the slot.
    #[must_use]
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        let starts_inside = self.starts_at <= start && start < self.ends_at;
        let ends_inside = self.starts_at < end && end <= self.ends_at;
        let contains = start <= self.starts_at && self.ends_at <= end;
        starts_inside || ends_inside || contains
    }
}

// ============================================================================
// Reservation lifecycle
// ============================================================================

/// Reservation status, persisted with the legacy Spanish strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Just created, awaiting payment.
    Inicial,
    /// Paid.
    Pagada,
    /// Completed (paid, or no payment required).
    Completada,
    /// Expired or cancelled; terminal, soft-deleted for audit.
    Cancelada,
}

impl ReservationStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inicial => "inicial",
            Self::Pagada => "pagada",
            Self::Completada => "completada",
            Self::Cancelada => "cancelada",
        }
    }

    /// Parses the database string representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the string does not name a known status.
    pub fn parse(s: &str) -> Result<Self, RepositoryError> {
        match s {
            "inicial" => Ok(Self::Inicial),
            "pagada" => Ok(Self::Pagada),
            "completada" => Ok(Self::Completada),
            "cancelada" => Ok(Self::Cancelada),
            other => Err(RepositoryError::invalid("status", other)),
        }
    }

    /// True for the terminal success states.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Pagada | Self::Completada)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation bookkeeping shared by reservations and subscriptions.
///
/// The `fallos_reporte` / `ultimo_error_reporte` columns are only ever
/// mutated through [`ReportState::record_failure`] and
/// [`ReportState::record_success`] so concurrent job runs cannot leave a
/// partial update behind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportState {
    /// Whether the record reached the external system.
    pub reported: bool,
    /// Consecutive reporting failures.
    pub failure_count: u32,
    /// Last failure message, truncated for storage.
    pub last_error: Option<String>,
}

impl ReportState {
    /// Records one failed reporting attempt.
    ///
    /// The message is truncated to [`MAX_ERROR_LEN`] characters, matching the
    /// database-side `LEFT(message, 255)`.
    pub fn record_failure(&mut self, message: &str) {
        self.failure_count += 1;
        self.last_error = Some(message.chars().take(MAX_ERROR_LEN).collect());
    }

    /// Records a successful report, clearing the failure trail.
    pub fn record_success(&mut self) {
        self.reported = true;
        self.last_error = None;
    }

    /// True once the record has exhausted its reporting attempts.
    #[must_use]
    pub const fn quarantined(&self, threshold: u32) -> bool {
        self.failure_count >= threshold
    }

    /// True when the record is still eligible for reporting.
    #[must_use]
    pub const fn eligible(&self, threshold: u32) -> bool {
        !self.reported && self.failure_count < threshold
    }
}

/// A single-date, single-slot booking by an identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    /// Reservation identifier.
    pub id: ReservationId,
    /// Booked space.
    pub space_id: SpaceId,
    /// Snapshot of the configuration in force when the booking was made, so
    /// later configuration edits don't retroactively change its rules.
    pub configuration_id: ConfigurationId,
    /// Booking identity.
    pub requester_id: RequesterId,
    /// Slot date.
    pub date: NaiveDate,
    /// Slot start.
    pub starts_at: NaiveTime,
    /// Slot end.
    pub ends_at: NaiveTime,
    /// Lifecycle status.
    pub status: ReservationStatus,
    /// Computed price, when the slot fell inside a price band.
    pub price: Option<i64>,
    /// Event code echoed back by the external system once reported.
    pub external_event_code: Option<String>,
    /// Person id echoed back by the external system once reported.
    pub external_person_id: Option<String>,
    /// Whether a ledger movement exists for this reservation.
    pub has_ledger_movement: bool,
    /// Reconciliation bookkeeping.
    pub report: ReportState,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Soft-delete timestamp (set on cancellation, kept for audit).
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// The slot's start moment as a naive datetime.
    #[must_use]
    pub fn starts_at_datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.starts_at)
    }
}

/// A date-range billable booking ("mensualidad"), alternate to per-slot
/// reservations. Shares the reconciliation bookkeeping with [`Reservation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    /// Subscription identifier.
    pub id: SubscriptionId,
    /// Covered space.
    pub space_id: SpaceId,
    /// Booking identity.
    pub requester_id: RequesterId,
    /// First covered date.
    pub starts_on: NaiveDate,
    /// Last covered date.
    pub ends_on: NaiveDate,
    /// Lifecycle status.
    pub status: ReservationStatus,
    /// Subscription price.
    pub price: i64,
    /// Event code echoed back by the external system once reported.
    pub external_event_code: Option<String>,
    /// Person id echoed back by the external system once reported.
    pub external_person_id: Option<String>,
    /// Reconciliation bookkeeping.
    pub report: ReportState,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Payments
// ============================================================================

/// Payment status as reported by the payment provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Settled.
    Ok,
    /// Awaiting provider confirmation.
    Pending,
    /// Provider session expired.
    Expired,
    /// Created but never submitted.
    Created,
    /// Rejected by the issuer.
    NotAuthorized,
    /// Failed at the provider.
    Failed,
    /// Provider-side error.
    Error,
    /// Initial placeholder state.
    Initial,
}

impl PaymentStatus {
    /// Only `OK` means the money actually moved.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Pending => "pending",
            Self::Expired => "expired",
            Self::Created => "created",
            Self::NotAuthorized => "not_authorized",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Initial => "initial",
        }
    }

    /// Parses the database string representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the string does not name a known status.
    pub fn parse(s: &str) -> Result<Self, RepositoryError> {
        match s {
            "OK" => Ok(Self::Ok),
            "pending" => Ok(Self::Pending),
            "expired" => Ok(Self::Expired),
            "created" => Ok(Self::Created),
            "not_authorized" => Ok(Self::NotAuthorized),
            "failed" => Ok(Self::Failed),
            "error" => Ok(Self::Error),
            "initial" => Ok(Self::Initial),
            other => Err(RepositoryError::invalid("payment_status", other)),
        }
    }

    /// The statuses the expiry job treats as "payment never settled".
    #[must_use]
    pub const fn non_settled() -> [Self; 7] {
        [
            Self::Pending,
            Self::Expired,
            Self::Created,
            Self::NotAuthorized,
            Self::Failed,
            Self::Error,
            Self::Initial,
        ]
    }
}

/// A payment associated with a reservation or subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payment {
    /// Payment identifier.
    pub id: PaymentId,
    /// External ticket id issued by the provider.
    pub ticket_id: String,
    /// Amount charged.
    pub amount: i64,
    /// Provider status.
    pub status: PaymentStatus,
}

// ============================================================================
// Billing identity
// ============================================================================

/// Billing data for the requesting identity, read from the identity/catalog
/// collaborator when building reporting payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BillingIdentity {
    /// Identity id in the local system.
    pub requester_id: RequesterId,
    /// Full name.
    pub full_name: String,
    /// National document number.
    pub document: String,
    /// Contact email.
    pub email: String,
    /// Street address.
    pub address: String,
    /// City code used by the external system.
    pub city_code: String,
    /// Region code used by the external system.
    pub region_code: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reservation_status_roundtrip() {
        for status in [
            ReservationStatus::Inicial,
            ReservationStatus::Pagada,
            ReservationStatus::Completada,
            ReservationStatus::Cancelada,
        ] {
            assert_eq!(ReservationStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ReservationStatus::parse("confirmada").is_err());
    }

    #[test]
    fn payment_status_only_ok_settles() {
        assert!(PaymentStatus::Ok.is_settled());
        for status in PaymentStatus::non_settled() {
            assert!(!status.is_settled());
        }
    }

    #[test]
    fn report_state_truncates_and_counts() {
        let mut report = ReportState::default();
        report.record_failure(&"x".repeat(400));
        report.record_failure("timeout");
        assert_eq!(report.failure_count, 2);
        assert_eq!(report.last_error.as_deref(), Some("timeout"));

        report.record_failure(&"y".repeat(400));
        assert_eq!(report.last_error.unwrap().len(), MAX_ERROR_LEN);
    }

    #[test]
    fn report_state_truncates_multibyte_messages_on_char_boundaries() {
        // Upstream mensajes are Spanish; a long accented message must not
        // split a character when cut down to storage size.
        let mut report = ReportState::default();
        report.record_failure(&"á".repeat(300));

        let stored = report.last_error.unwrap();
        assert_eq!(stored.chars().count(), MAX_ERROR_LEN);
        assert!(stored.chars().all(|c| c == 'á'));
    }

    #[test]
    fn report_state_quarantine_boundary() {
        let mut report = ReportState::default();
        for _ in 0..QUARANTINE_THRESHOLD - 1 {
            report.record_failure("boom");
        }
        assert!(report.eligible(QUARANTINE_THRESHOLD));
        report.record_failure("boom");
        assert!(report.quarantined(QUARANTINE_THRESHOLD));
        assert!(!report.eligible(QUARANTINE_THRESHOLD));
    }

    #[test]
    fn report_success_clears_error() {
        let mut report = ReportState::default();
        report.record_failure("boom");
        report.record_success();
        assert!(report.reported);
        assert!(report.last_error.is_none());
    }

    #[test]
    fn holiday_scope_is_weekday_eight() {
        assert_eq!(ScheduleScope::Holiday.weekday_number(), Some(8));
        assert_eq!(
            ScheduleScope::from_weekday_number(8).unwrap(),
            ScheduleScope::Holiday
        );
        assert!(ScheduleScope::from_weekday_number(9).is_err());
    }

    #[test]
    fn closure_overlap_cases() {
        let closure = ClosureEvent {
            id: ClosureId::new(),
            space_id: SpaceId::new(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            starts_at: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            ends_at: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            description: "mantenimiento".into(),
            kind: ClosureKind::Maintenance,
            origin: ClosureOrigin::Manual,
            deleted_at: None,
        };
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();

        // closure fully inside slot
        assert!(closure.overlaps(t(8, 0), t(9, 0)));
        // slot starts inside closure
        assert!(closure.overlaps(t(8, 15), t(9, 15)));
        // slot ends inside closure
        assert!(closure.overlaps(t(7, 30), t(8, 30)));
        // disjoint
        assert!(!closure.overlaps(t(9, 0), t(10, 0)));
        assert!(!closure.overlaps(t(7, 0), t(8, 0)));
    }
}
