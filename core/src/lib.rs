//! # Bookings Core
//!
//! Domain model and scheduling engine for the facility-booking backend.
//!
//! This crate is deliberately free of I/O: persistence and HTTP live behind
//! the traits in [`repository`], implemented by `bookings-postgres` and the
//! in-memory fakes in `bookings-testing`.
//!
//! ## Core Components
//!
//! - **Configuration Resolver**: picks the single schedule configuration that
//!   governs a space on a given date (exact date > holiday > weekday).
//! - **Slot Availability Builder**: a pure function deriving the bookable-slot
//!   calendar from a configuration, its price bands and the day's closures.
//! - **Reservation Lifecycle**: the `inicial → {pagada|completada, cancelada}`
//!   state machine with typed ineligibility reasons.

/// Slot calendar derivation.
pub mod availability;

/// Error types shared across the domain.
pub mod error;

/// Reservation state machine and cancellation policy.
pub mod lifecycle;

/// Persistence and collaborator seams.
pub mod repository;

/// Schedule configuration resolution.
pub mod resolver;

/// Domain entities and value objects.
pub mod types;

pub use availability::{build_availability, occupancy, OccupancySummary, Slot, SlotStatus};
pub use error::{CancellationIneligibility, RepositoryError, TransitionError};
pub use lifecycle::check_cancellable;
pub use repository::{
    Clock, ClosureRepository, DigestEntry, DigestRecordKind, FailureDigest, HolidayCalendar,
    NotificationError, NotificationSink, ReservationRepository, ScheduleRepository, SpaceCatalog,
    SubscriptionRepository, SystemClock,
};
pub use resolver::ConfigurationResolver;
pub use types::{
    BillingIdentity, BillingKind, ClosureEvent, ClosureId, ClosureKind, ClosureOrigin,
    ConfigurationId, Payment, PaymentId, PaymentStatus, PriceBand, ReportState, RequesterId,
    Reservation, ReservationId, ReservationStatus, ScheduleConfiguration, ScheduleScope, Space,
    SpaceId, Subscription, SubscriptionId, MAX_ERROR_LEN, QUARANTINE_THRESHOLD,
};
