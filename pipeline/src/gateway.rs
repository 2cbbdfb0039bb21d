//! Seam between the jobs and the UNAB client, so job logic can be tested
//! without a network.

use async_trait::async_trait;
use bookings_unab::{
    CancellationNotice, ClosureQuery, RawClosureRow, ReportAck, TransactionReport, UnabClient,
    UnabError,
};

/// The three reconciliation calls the jobs make.
#[async_trait]
pub trait ReconciliationGateway: Send + Sync {
    /// Tarea 2: closures for a space over a date window.
    async fn query_closures(&self, query: &ClosureQuery) -> Result<Vec<RawClosureRow>, UnabError>;

    /// Tarea 3: report a settled reservation or subscription.
    async fn report_transaction(&self, report: &TransactionReport)
        -> Result<ReportAck, UnabError>;

    /// Tarea 4: cancel a previously reported event.
    async fn report_cancellation(&self, notice: &CancellationNotice) -> Result<(), UnabError>;
}

#[async_trait]
impl ReconciliationGateway for UnabClient {
    async fn query_closures(&self, query: &ClosureQuery) -> Result<Vec<RawClosureRow>, UnabError> {
        Self::query_closures(self, query).await
    }

    async fn report_transaction(
        &self,
        report: &TransactionReport,
    ) -> Result<ReportAck, UnabError> {
        Self::report_transaction(self, report).await
    }

    async fn report_cancellation(&self, notice: &CancellationNotice) -> Result<(), UnabError> {
        Self::report_cancellation(self, notice).await
    }
}
