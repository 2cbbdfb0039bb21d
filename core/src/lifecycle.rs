//! Reservation Lifecycle.
//!
//! States: `inicial → {pagada|completada, cancelada}`. `pagada`/`completada`
//! are the terminal success states; `cancelada` is terminal failure and is
//! always paired with a soft-delete timestamp for audit retention.
//!
//! Transitions attempted from an invalid source state come back as typed
//! rejections, never as generic errors: a caller that asks to cancel an
//! already-cancelled reservation gets [`CancellationIneligibility`], not a
//! 500.

use crate::error::{CancellationIneligibility, TransitionError};
use crate::types::{Reservation, ReservationStatus, ScheduleConfiguration};
use chrono::{DateTime, Duration, Utc};

/// Checks the cancellation policy for a reservation under its configuration
/// snapshot.
///
/// Eligibility requires, in order: no ledger movement, not already cancelled,
/// a start moment still in the future, and at least the configuration's
/// cancellation lead time remaining. A reservation exactly at the lead-time
/// boundary is still cancellable.
///
/// # Errors
///
/// Returns the first failing [`CancellationIneligibility`].
pub fn check_cancellable(
    reservation: &Reservation,
    config: &ScheduleConfiguration,
    now: DateTime<Utc>,
) -> Result<(), CancellationIneligibility> {
    if reservation.has_ledger_movement {
        return Err(CancellationIneligibility::LedgerMovement);
    }
    if reservation.status == ReservationStatus::Cancelada {
        return Err(CancellationIneligibility::AlreadyCancelled);
    }

    let starts_at = reservation.starts_at_datetime();
    let now = now.naive_utc();
    if starts_at <= now {
        return Err(CancellationIneligibility::AlreadyStarted);
    }

    let remaining = starts_at.signed_duration_since(now);
    let required = Duration::minutes(config.cancellation_lead_minutes);
    if remaining < required {
        return Err(CancellationIneligibility::window(
            config.cancellation_lead_minutes,
            remaining,
        ));
    }

    Ok(())
}

impl Reservation {
    /// Moves `inicial → pagada`.
    ///
    /// # Errors
    ///
    /// Rejects any other source state.
    pub fn mark_paid(&mut self) -> Result<(), TransitionError> {
        self.transition(ReservationStatus::Inicial, ReservationStatus::Pagada)
    }

    /// Moves `inicial`/`pagada` → `completada`.
    ///
    /// # Errors
    ///
    /// Rejects a cancelled or already-completed source state.
    pub fn mark_completed(&mut self) -> Result<(), TransitionError> {
        match self.status {
            ReservationStatus::Inicial | ReservationStatus::Pagada => {
                self.status = ReservationStatus::Completada;
                Ok(())
            }
            from => Err(TransitionError {
                from,
                attempted: ReservationStatus::Completada,
            }),
        }
    }

    /// Moves the reservation to `cancelada` and stamps the soft-delete, in
    /// one step so the two signals can never diverge.
    ///
    /// # Errors
    ///
    /// Rejects an already-cancelled source state.
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status == ReservationStatus::Cancelada {
            return Err(TransitionError {
                from: self.status,
                attempted: ReservationStatus::Cancelada,
            });
        }
        self.status = ReservationStatus::Cancelada;
        self.deleted_at = Some(now);
        Ok(())
    }

    fn transition(
        &mut self,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<(), TransitionError> {
        if self.status != from {
            return Err(TransitionError {
                from: self.status,
                attempted: to,
            });
        }
        self.status = to;
        Ok(())
    }
}
