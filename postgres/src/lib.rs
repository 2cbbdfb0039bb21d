//! # Bookings Postgres
//!
//! `PostgreSQL` implementations of the `bookings-core` repository traits,
//! built on sqlx with runtime-checked queries. Schema lives in
//! `migrations/`; status and kind columns store the string forms defined by
//! the core types.
//!
//! Row-to-domain mapping is total: an unknown status string surfaces as
//! [`bookings_core::RepositoryError::InvalidField`] instead of a panic.

use bookings_core::RepositoryError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Space catalog and billing identities.
pub mod catalog;

/// Closure events.
pub mod closures;

/// Public-holiday calendar with a per-year cache.
pub mod holidays;

/// Reservations and their reconciliation bookkeeping.
pub mod reservations;

/// Schedule configurations and price bands.
pub mod schedules;

/// Subscriptions.
pub mod subscriptions;

pub use catalog::PgSpaceCatalog;
pub use closures::PgClosureRepository;
pub use holidays::PgHolidayCalendar;
pub use reservations::PgReservationRepository;
pub use schedules::PgScheduleRepository;
pub use subscriptions::PgSubscriptionRepository;

/// Connects a pool with the given size and a 5-second connect timeout.
///
/// # Errors
///
/// Returns [`RepositoryError::Database`] when the database is unreachable.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, RepositoryError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
        .map_err(db_err)
}

pub(crate) fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}
