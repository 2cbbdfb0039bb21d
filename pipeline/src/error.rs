//! Job-level errors.
//!
//! Only failures that prevent a whole pass from making progress surface
//! here (the candidate query failing, for example). Anything scoped to a
//! single record is logged and recorded against that record instead.

use bookings_core::RepositoryError;
use bookings_unab::UnabError;
use thiserror::Error;

/// A batch-fatal job failure.
#[derive(Debug, Error)]
pub enum JobError {
    /// The database was unavailable or rejected a query.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The reconciliation service failed in a way that stops the pass.
    #[error(transparent)]
    Gateway(#[from] UnabError),
}
