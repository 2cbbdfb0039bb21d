//! Error types for the UNAB client.

use thiserror::Error;

/// Failures talking to the reconciliation service.
///
/// Everything here is a *transient integration failure* from the pipeline's
/// point of view: jobs record it against the item and move on; nothing is
/// batch-fatal.
#[derive(Debug, Error)]
pub enum UnabError {
    /// Request never completed within the configured timeouts.
    #[error("UNAB request timed out")]
    Timeout,

    /// Transport-level failure (DNS, connect, TLS, ...).
    #[error("UNAB request failed: {0}")]
    Transport(String),

    /// Credentials were rejected.
    #[error("UNAB rejected the credentials")]
    Unauthorized,

    /// Non-2xx response.
    #[error("UNAB returned HTTP {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The body was not a recognizable `{estado, mensaje, datos}` envelope.
    #[error("malformed UNAB response: {0}")]
    MalformedResponse(String),

    /// The envelope arrived well-formed but `estado` was not `success`.
    #[error("UNAB rejected the task: {mensaje}")]
    TaskRejected {
        /// The `mensaje` field from the response.
        mensaje: String,
    },

    /// The client itself could not be constructed.
    #[error("could not build UNAB client: {0}")]
    Build(String),
}

impl UnabError {
    /// Whether an immediate retry of the same request could plausibly
    /// succeed. Auth, envelope and task-status failures will not change on
    /// a re-send.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A single malformed closure row from a tarea-2 response.
///
/// Row-level, so the sync job can skip the offending record with a warning
/// and keep processing the rest of the batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    /// A required field was absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A date did not match `YYYY-MM-DD`.
    #[error("invalid date `{0}`")]
    BadDate(String),

    /// A time did not match `HH:MM`.
    #[error("invalid time `{0}`")]
    BadTime(String),

    /// The end of the range precedes its start.
    #[error("range ends before it starts: {0}..{1}")]
    InvertedRange(String, String),
}
