//! Error taxonomy for the booking engine.
//!
//! Following the engine's error design: "no configuration" is not an error,
//! ineligibility is a typed rejection, and only infrastructure failures
//! surface as `RepositoryError`.

use crate::types::ReservationStatus;
use chrono::Duration;
use thiserror::Error;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(String),

    /// The requested record does not exist.
    #[error("record not found")]
    NotFound,

    /// A stored value could not be mapped to its domain type.
    #[error("invalid {field}: {value}")]
    InvalidField {
        /// The offending column or attribute.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl RepositoryError {
    /// Builds an [`RepositoryError::InvalidField`].
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
        }
    }
}

/// Why a cancellation request was refused.
///
/// These are policy outcomes, not failures: callers surface the reason to the
/// user instead of treating it as an internal error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CancellationIneligibility {
    /// A ledger movement exists; the booking can no longer be cancelled.
    #[error("reservation has an associated ledger movement")]
    LedgerMovement,

    /// The reservation is already cancelled.
    #[error("reservation is already cancelled")]
    AlreadyCancelled,

    /// The slot's start moment is in the past.
    #[error("reservation has already started")]
    AlreadyStarted,

    /// Too close to the slot start for the configuration's policy.
    #[error("cancellation window closed: {required_minutes} minutes required, {remaining_minutes} remaining")]
    InsideCancellationWindow {
        /// The configuration's cancellation lead time.
        required_minutes: i64,
        /// Minutes left until the slot starts.
        remaining_minutes: i64,
    },
}

impl CancellationIneligibility {
    /// Builds the window rejection from the lead time and remaining duration.
    #[must_use]
    pub const fn window(required_minutes: i64, remaining: Duration) -> Self {
        Self::InsideCancellationWindow {
            required_minutes,
            remaining_minutes: remaining.num_minutes(),
        }
    }
}

/// A lifecycle transition attempted from an invalid source state.
///
/// Treated as an explicit no-op with a reason rather than a generic error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot move reservation from {from} to {attempted}")]
pub struct TransitionError {
    /// Current status of the record.
    pub from: ReservationStatus,
    /// Status the caller tried to reach.
    pub attempted: ReservationStatus,
}
