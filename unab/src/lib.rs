//! # Bookings UNAB
//!
//! Client for the external reconciliation service ("UNAB"): a single JSON
//! endpoint behind Basic Auth, discriminated by a `tarea` task code:
//!
//! - `2`: query closures for a space over a date range;
//! - `3`: report a completed reservation or subscription;
//! - `4`: report a cancellation.
//!
//! Responses are `{ estado, mensaje, datos }` objects, sometimes wrapped in a
//! single-element array; [`client::UnabClient`] normalizes both shapes.
//! Outbound calls carry bounded connect/read timeouts so a slow upstream can
//! never stall a batch job.

/// Client implementation.
pub mod client;

/// Error types.
pub mod error;

/// Wire types: task codes, payloads, closure rows.
pub mod types;

pub use client::{UnabClient, UnabConfig};
pub use error::{RowError, UnabError};
pub use types::{
    CancellationNotice, ClosureQuery, ClosureRecord, RawClosureRow, ReportAck, Tarea,
    TransactionLine, TransactionReport,
};
