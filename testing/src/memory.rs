//! In-memory repositories backed by `tokio::sync::Mutex`.
//!
//! Semantics mirror the production SQL in `bookings-postgres`: the expiry
//! candidate filter, the duplicate-closure match and the reporting
//! eligibility rules are the same, so job tests exercise the real pipeline
//! logic.

use async_trait::async_trait;
use bookings_core::repository::{
    Clock, ClosureRepository, FailureDigest, HolidayCalendar, NotificationError, NotificationSink,
    ReservationRepository, Result, ScheduleRepository, SpaceCatalog, SubscriptionRepository,
};
use bookings_core::{
    BillingIdentity, ClosureEvent, ClosureId, ConfigurationId, Payment, PriceBand, RepositoryError,
    RequesterId, Reservation, ReservationId, ReservationStatus, ScheduleConfiguration,
    ScheduleScope, Space, SpaceId, Subscription, SubscriptionId,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// A clock pinned to a single instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Holiday calendar backed by a set of dates.
#[derive(Debug, Default)]
pub struct FixedHolidays(pub HashSet<NaiveDate>);

#[async_trait]
impl HolidayCalendar for FixedHolidays {
    async fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.0.contains(&date))
    }
}

/// In-memory schedule configurations and price bands.
#[derive(Default)]
pub struct InMemorySchedules {
    configs: Mutex<Vec<ScheduleConfiguration>>,
    bands: Mutex<Vec<PriceBand>>,
}

impl InMemorySchedules {
    /// Adds a configuration.
    pub async fn add(&self, config: ScheduleConfiguration) {
        self.configs.lock().await.push(config);
    }

    /// Adds a price band.
    pub async fn add_band(&self, band: PriceBand) {
        self.bands.lock().await.push(band);
    }
}

#[async_trait]
impl ScheduleRepository for InMemorySchedules {
    async fn find_for_date(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
    ) -> Result<Option<ScheduleConfiguration>> {
        Ok(self
            .configs
            .lock()
            .await
            .iter()
            .find(|c| c.space_id == space_id && c.scope == ScheduleScope::Date(date))
            .cloned())
    }

    async fn find_for_weekday(
        &self,
        space_id: SpaceId,
        weekday: u8,
    ) -> Result<Option<ScheduleConfiguration>> {
        Ok(self
            .configs
            .lock()
            .await
            .iter()
            .find(|c| c.space_id == space_id && c.scope.weekday_number() == Some(weekday))
            .cloned())
    }

    async fn price_bands(&self, configuration_id: ConfigurationId) -> Result<Vec<PriceBand>> {
        Ok(self
            .bands
            .lock()
            .await
            .iter()
            .filter(|b| b.configuration_id == configuration_id)
            .cloned()
            .collect())
    }
}

/// In-memory closure events.
#[derive(Default)]
pub struct InMemoryClosures {
    closures: Mutex<Vec<ClosureEvent>>,
}

impl InMemoryClosures {
    /// Adds a closure directly.
    pub async fn add(&self, closure: ClosureEvent) {
        self.closures.lock().await.push(closure);
    }

    /// All stored closures, for assertions.
    pub async fn all(&self) -> Vec<ClosureEvent> {
        self.closures.lock().await.clone()
    }
}

#[async_trait]
impl ClosureRepository for InMemoryClosures {
    async fn active_for_space_on(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
    ) -> Result<Vec<ClosureEvent>> {
        Ok(self
            .closures
            .lock()
            .await
            .iter()
            .filter(|c| c.space_id == space_id && c.date == date && c.is_active())
            .cloned()
            .collect())
    }

    async fn exists_matching(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
        starts_at: NaiveTime,
        ends_at: NaiveTime,
    ) -> Result<bool> {
        Ok(self.closures.lock().await.iter().any(|c| {
            c.space_id == space_id
                && c.date == date
                && c.starts_at == starts_at
                && c.ends_at <= ends_at
                && c.is_active()
        }))
    }

    async fn insert(&self, closure: &ClosureEvent) -> Result<()> {
        self.closures.lock().await.push(closure.clone());
        Ok(())
    }

    async fn soft_delete(&self, id: ClosureId, now: DateTime<Utc>) -> Result<()> {
        let mut closures = self.closures.lock().await;
        let closure = closures
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        closure.deleted_at = Some(now);
        Ok(())
    }

    async fn restore(&self, id: ClosureId) -> Result<()> {
        let mut closures = self.closures.lock().await;
        let closure = closures
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        closure.deleted_at = None;
        Ok(())
    }
}

/// In-memory reservations with their payments.
#[derive(Default)]
pub struct InMemoryReservations {
    reservations: Mutex<HashMap<ReservationId, Reservation>>,
    payments: Mutex<HashMap<ReservationId, Payment>>,
}

impl InMemoryReservations {
    /// Inserts a reservation.
    pub async fn add(&self, reservation: Reservation) {
        self.reservations
            .lock()
            .await
            .insert(reservation.id, reservation);
    }

    /// Attaches a payment to a reservation.
    pub async fn add_payment(&self, id: ReservationId, payment: Payment) {
        self.payments.lock().await.insert(id, payment);
    }

    /// Fetches a reservation for assertions.
    pub async fn get(&self, id: ReservationId) -> Option<Reservation> {
        self.reservations.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservations {
    async fn find(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.reservations.lock().await.get(&id).cloned())
    }

    async fn booked_starts(&self, space_id: SpaceId, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        Ok(self
            .reservations
            .lock()
            .await
            .values()
            .filter(|r| {
                r.space_id == space_id
                    && r.date == date
                    && r.status != ReservationStatus::Cancelada
            })
            .map(|r| r.starts_at)
            .collect())
    }

    async fn expiry_candidates(
        &self,
        on_or_after: NaiveDate,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>> {
        let payments = self.payments.lock().await;
        let mut candidates: Vec<Reservation> = self
            .reservations
            .lock()
            .await
            .values()
            .filter(|r| {
                r.status == ReservationStatus::Inicial
                    && r.date >= on_or_after
                    && r.created_at < created_before
                    && payments.get(&r.id).map_or(true, |p| !p.status.is_settled())
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|r| r.created_at);
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn cancel(&self, id: ReservationId, now: DateTime<Utc>) -> Result<()> {
        let mut reservations = self.reservations.lock().await;
        let reservation = reservations
            .get_mut(&id)
            .filter(|r| r.status != ReservationStatus::Cancelada)
            .ok_or(RepositoryError::NotFound)?;
        reservation.status = ReservationStatus::Cancelada;
        reservation.deleted_at = Some(now);
        Ok(())
    }

    async fn unreported(&self, threshold: u32, limit: usize) -> Result<Vec<Reservation>> {
        let payments = self.payments.lock().await;
        let mut eligible: Vec<Reservation> = self
            .reservations
            .lock()
            .await
            .values()
            .filter(|r| {
                let paid = payments.get(&r.id).is_some_and(|p| p.status.is_settled());
                let complete_without_payment = r.status == ReservationStatus::Completada
                    && !payments.contains_key(&r.id);
                r.status.is_settled()
                    && r.report.eligible(threshold)
                    && (paid || complete_without_payment)
            })
            .cloned()
            .collect();
        eligible.sort_by_key(|r| r.created_at);
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn mark_reported(
        &self,
        id: ReservationId,
        external_person_id: Option<&str>,
        event_code: Option<&str>,
    ) -> Result<()> {
        let mut reservations = self.reservations.lock().await;
        let reservation = reservations.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        reservation.report.record_success();
        if let Some(person) = external_person_id {
            reservation.external_person_id = Some(person.to_string());
        }
        if let Some(event) = event_code {
            reservation.external_event_code = Some(event.to_string());
        }
        Ok(())
    }

    async fn record_failure(&self, id: ReservationId, message: &str) -> Result<()> {
        let mut reservations = self.reservations.lock().await;
        let reservation = reservations.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        reservation.report.record_failure(message);
        Ok(())
    }

    async fn quarantined(&self, threshold: u32, limit: usize) -> Result<Vec<Reservation>> {
        let mut hits: Vec<Reservation> = self
            .reservations
            .lock()
            .await
            .values()
            .filter(|r| !r.report.reported && r.report.quarantined(threshold))
            .cloned()
            .collect();
        hits.sort_by_key(|r| r.created_at);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn payment_for(&self, id: ReservationId) -> Result<Option<Payment>> {
        Ok(self.payments.lock().await.get(&id).cloned())
    }
}

/// In-memory subscriptions with their payments.
#[derive(Default)]
pub struct InMemorySubscriptions {
    subscriptions: Mutex<HashMap<SubscriptionId, Subscription>>,
    payments: Mutex<HashMap<SubscriptionId, Payment>>,
}

impl InMemorySubscriptions {
    /// Inserts a subscription.
    pub async fn add(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .await
            .insert(subscription.id, subscription);
    }

    /// Attaches a payment to a subscription.
    pub async fn add_payment(&self, id: SubscriptionId, payment: Payment) {
        self.payments.lock().await.insert(id, payment);
    }

    /// Fetches a subscription for assertions.
    pub async fn get(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptions {
    async fn unreported(&self, threshold: u32, limit: usize) -> Result<Vec<Subscription>> {
        let payments = self.payments.lock().await;
        let mut eligible: Vec<Subscription> = self
            .subscriptions
            .lock()
            .await
            .values()
            .filter(|s| {
                let paid = payments.get(&s.id).is_some_and(|p| p.status.is_settled());
                s.status.is_settled() && s.report.eligible(threshold) && paid
            })
            .cloned()
            .collect();
        eligible.sort_by_key(|s| s.created_at);
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn mark_reported(
        &self,
        id: SubscriptionId,
        external_person_id: Option<&str>,
        event_code: Option<&str>,
    ) -> Result<()> {
        let mut subscriptions = self.subscriptions.lock().await;
        let subscription = subscriptions.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        subscription.report.record_success();
        if let Some(person) = external_person_id {
            subscription.external_person_id = Some(person.to_string());
        }
        if let Some(event) = event_code {
            subscription.external_event_code = Some(event.to_string());
        }
        Ok(())
    }

    async fn record_failure(&self, id: SubscriptionId, message: &str) -> Result<()> {
        let mut subscriptions = self.subscriptions.lock().await;
        let subscription = subscriptions.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        subscription.report.record_failure(message);
        Ok(())
    }

    async fn quarantined(&self, threshold: u32, limit: usize) -> Result<Vec<Subscription>> {
        let mut hits: Vec<Subscription> = self
            .subscriptions
            .lock()
            .await
            .values()
            .filter(|s| !s.report.reported && s.report.quarantined(threshold))
            .cloned()
            .collect();
        hits.sort_by_key(|s| s.created_at);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn payment_for(&self, id: SubscriptionId) -> Result<Option<Payment>> {
        Ok(self.payments.lock().await.get(&id).cloned())
    }
}

/// In-memory space catalog and billing identities.
#[derive(Default)]
pub struct InMemoryCatalog {
    spaces: Mutex<Vec<Space>>,
    identities: Mutex<HashMap<RequesterId, BillingIdentity>>,
}

impl InMemoryCatalog {
    /// Adds a space.
    pub async fn add_space(&self, space: Space) {
        self.spaces.lock().await.push(space);
    }

    /// Adds a billing identity.
    pub async fn add_identity(&self, identity: BillingIdentity) {
        self.identities
            .lock()
            .await
            .insert(identity.requester_id, identity);
    }
}

#[async_trait]
impl SpaceCatalog for InMemoryCatalog {
    async fn find(&self, id: SpaceId) -> Result<Option<Space>> {
        Ok(self.spaces.lock().await.iter().find(|s| s.id == id).cloned())
    }

    async fn active_with_codes(&self) -> Result<Vec<Space>> {
        Ok(self
            .spaces
            .lock()
            .await
            .iter()
            .filter(|s| s.active && s.has_external_codes())
            .cloned()
            .collect())
    }

    async fn billing_identity(&self, id: RequesterId) -> Result<Option<BillingIdentity>> {
        Ok(self.identities.lock().await.get(&id).cloned())
    }
}

/// Notification sink that records digests, optionally failing on demand.
#[derive(Default)]
pub struct CaptureSink {
    digests: Mutex<Vec<FailureDigest>>,
    fail: Mutex<bool>,
}

impl CaptureSink {
    /// Makes the next sends fail.
    pub async fn fail_next(&self) {
        *self.fail.lock().await = true;
    }

    /// Digests captured so far.
    pub async fn digests(&self) -> Vec<FailureDigest> {
        self.digests.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for CaptureSink {
    async fn send_digest(
        &self,
        digest: &FailureDigest,
    ) -> std::result::Result<(), NotificationError> {
        if *self.fail.lock().await {
            return Err(NotificationError("smtp unreachable".into()));
        }
        self.digests.lock().await.push(digest.clone());
        Ok(())
    }
}
