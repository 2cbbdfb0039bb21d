//! Pipeline tuning knobs, injected into every job at startup.

/// Shared configuration for the reconciliation jobs.
#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Records processed per batch.
    pub chunk_size: usize,
    /// Minutes an unpaid reservation may sit before the expiry job cancels
    /// it.
    pub expiry_grace_minutes: i64,
    /// Days ahead the closure-sync job looks when querying the external
    /// calendar.
    pub closure_window_days: i64,
    /// Consecutive report failures after which a record is quarantined.
    pub quarantine_threshold: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            expiry_grace_minutes: 30,
            closure_window_days: 30,
            quarantine_threshold: 5,
        }
    }
}
