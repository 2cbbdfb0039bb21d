//! Seams between the engine and its collaborators.
//!
//! Persistence, the identity/catalog read model, the holiday calendar, the
//! notification sink and the clock are all consumed through these traits.
//! `bookings-postgres` provides the production implementations and
//! `bookings-testing` the in-memory ones.

use crate::error::RepositoryError;
use crate::types::{
    BillingIdentity, ClosureEvent, ClosureId, ConfigurationId, Payment, PriceBand, RequesterId,
    Reservation, ReservationId, ScheduleConfiguration, Space, SpaceId, Subscription,
    SubscriptionId,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

/// Result alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Clock seam so jobs and policies can be tested at a fixed instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Schedule configurations and their price bands.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// The configuration scoped exactly to `date`, if any.
    async fn find_for_date(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
    ) -> Result<Option<ScheduleConfiguration>>;

    /// The configuration scoped to `weekday` (1–7, 8 = holiday), if any.
    async fn find_for_weekday(
        &self,
        space_id: SpaceId,
        weekday: u8,
    ) -> Result<Option<ScheduleConfiguration>>;

    /// All price bands of a configuration, active or not.
    async fn price_bands(&self, configuration_id: ConfigurationId) -> Result<Vec<PriceBand>>;
}

/// Closure events ("novedades").
#[async_trait]
pub trait ClosureRepository: Send + Sync {
    /// Non-deleted closures affecting a space on `date`.
    async fn active_for_space_on(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
    ) -> Result<Vec<ClosureEvent>>;

    /// Duplicate check used by the sync job: an existing non-deleted closure
    /// for the same space and date, same start, and an end at or before
    /// `ends_at`. Exact-match semantics are deliberate.
    async fn exists_matching(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
        starts_at: NaiveTime,
        ends_at: NaiveTime,
    ) -> Result<bool>;

    /// Inserts a new closure event.
    async fn insert(&self, closure: &ClosureEvent) -> Result<()>;

    /// Soft-deletes a closure so it stops affecting availability.
    async fn soft_delete(&self, id: ClosureId, now: DateTime<Utc>) -> Result<()>;

    /// Restores a soft-deleted closure.
    async fn restore(&self, id: ClosureId) -> Result<()>;
}

/// Reservations and their reconciliation bookkeeping.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Fetches one reservation. Jobs re-fetch before mutating so they never
    /// act on stale status.
    async fn find(&self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Start times of confirmed (non-cancelled) reservations for a space on
    /// `date`, feeding the availability builder.
    async fn booked_starts(&self, space_id: SpaceId, date: NaiveDate) -> Result<Vec<NaiveTime>>;

    /// Reservations dated `on_or_after` or later, created before
    /// `created_before`, whose payment is absent or in a non-settled status.
    async fn expiry_candidates(
        &self,
        on_or_after: NaiveDate,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>>;

    /// Marks a reservation `cancelada` and soft-deletes it in one
    /// transaction. Guarded on the current status not already being
    /// `cancelada`.
    ///
    /// Returns [`RepositoryError::NotFound`] when no row matched the guard.
    async fn cancel(&self, id: ReservationId, now: DateTime<Utc>) -> Result<()>;

    /// Unreported reservations under the failure threshold, in settled
    /// status, oldest first.
    async fn unreported(&self, threshold: u32, limit: usize) -> Result<Vec<Reservation>>;

    /// Marks a reservation reported, clears the last error and persists the
    /// identity-linking fields echoed back by the external system.
    async fn mark_reported(
        &self,
        id: ReservationId,
        external_person_id: Option<&str>,
        event_code: Option<&str>,
    ) -> Result<()>;

    /// Single idempotent increment-and-persist of the failure bookkeeping.
    async fn record_failure(&self, id: ReservationId, message: &str) -> Result<()>;

    /// Reservations at or above the quarantine threshold.
    async fn quarantined(&self, threshold: u32, limit: usize) -> Result<Vec<Reservation>>;

    /// The payment tied to a reservation, if one exists.
    async fn payment_for(&self, id: ReservationId) -> Result<Option<Payment>>;
}

/// Subscriptions ("mensualidades") share the reservation bookkeeping.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Unreported subscriptions under the failure threshold, in settled
    /// status, oldest first.
    async fn unreported(&self, threshold: u32, limit: usize) -> Result<Vec<Subscription>>;

    /// Marks a subscription reported and persists the echoed identity fields.
    async fn mark_reported(
        &self,
        id: SubscriptionId,
        external_person_id: Option<&str>,
        event_code: Option<&str>,
    ) -> Result<()>;

    /// Single idempotent increment-and-persist of the failure bookkeeping.
    async fn record_failure(&self, id: SubscriptionId, message: &str) -> Result<()>;

    /// Subscriptions at or above the quarantine threshold.
    async fn quarantined(&self, threshold: u32, limit: usize) -> Result<Vec<Subscription>>;

    /// The payment tied to a subscription, if one exists.
    async fn payment_for(&self, id: SubscriptionId) -> Result<Option<Payment>>;
}

/// Read-only view of the space catalog and billing identities, owned by the
/// external catalog subsystem.
#[async_trait]
pub trait SpaceCatalog: Send + Sync {
    /// Fetches one space.
    async fn find(&self, id: SpaceId) -> Result<Option<Space>>;

    /// Active spaces that carry both external codes, the population the
    /// closure-sync job iterates.
    async fn active_with_codes(&self) -> Result<Vec<Space>>;

    /// Billing data for a requesting identity.
    async fn billing_identity(&self, id: RequesterId) -> Result<Option<BillingIdentity>>;
}

/// Public-holiday lookup, backed by a read-through cache per country/year.
#[async_trait]
pub trait HolidayCalendar: Send + Sync {
    /// Whether `date` is a public holiday.
    async fn is_holiday(&self, date: NaiveDate) -> Result<bool>;
}

/// Failure emitted by the notification sink. Digest delivery is best-effort,
/// so callers log this instead of retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("notification failed: {0}")]
pub struct NotificationError(pub String);

/// Which kind of record a digest entry refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestRecordKind {
    /// A per-slot reservation.
    Reservation,
    /// A date-range subscription.
    Subscription,
}

/// One quarantined record in the operations digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestEntry {
    /// Record kind.
    pub kind: DigestRecordKind,
    /// Record identifier, rendered for the ops email.
    pub id: String,
    /// Failure count at digest time.
    pub failure_count: u32,
    /// Last recorded failure message.
    pub last_error: Option<String>,
}

/// Summary of quarantined records, sent to operations after a reporting pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureDigest {
    /// When the digest was assembled.
    pub generated_at: DateTime<Utc>,
    /// Quarantined records.
    pub entries: Vec<DigestEntry>,
}

impl FailureDigest {
    /// True when there is nothing to report.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outbound operations notifications (email behind the scenes).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends the failure digest. Fire-and-forget from the caller's view.
    async fn send_digest(&self, digest: &FailureDigest)
        -> std::result::Result<(), NotificationError>;
}
