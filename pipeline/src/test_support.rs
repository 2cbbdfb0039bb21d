//! Shared test double for the reconciliation gateway.

#![allow(clippy::unwrap_used)]

use crate::gateway::ReconciliationGateway;
use async_trait::async_trait;
use bookings_unab::{
    CancellationNotice, ClosureQuery, RawClosureRow, ReportAck, TransactionReport, UnabError,
};
use tokio::sync::Mutex;

/// Gateway double with scripted responses and call capture.
///
/// Responses are consumed front-to-back; an empty script yields a benign
/// default (no rows, an ack carrying `P-1`/`EV-1`).
#[derive(Default)]
pub struct StubGateway {
    closure_script: Mutex<Vec<Result<Vec<RawClosureRow>, UnabError>>>,
    report_script: Mutex<Vec<Result<ReportAck, UnabError>>>,
    fail_cancellations: Mutex<bool>,
    pub queries: Mutex<Vec<ClosureQuery>>,
    pub reports: Mutex<Vec<TransactionReport>>,
    pub cancellations: Mutex<Vec<CancellationNotice>>,
}

impl StubGateway {
    pub async fn script_closures(&self, response: Result<Vec<RawClosureRow>, UnabError>) {
        self.closure_script.lock().await.push(response);
    }

    pub async fn script_report(&self, response: Result<ReportAck, UnabError>) {
        self.report_script.lock().await.push(response);
    }

    pub async fn fail_cancellations(&self) {
        *self.fail_cancellations.lock().await = true;
    }
}

fn default_ack() -> ReportAck {
    ReportAck {
        codigo_persona: Some("P-1".into()),
        codigo_evento: Some("EV-1".into()),
    }
}

#[async_trait]
impl ReconciliationGateway for StubGateway {
    async fn query_closures(&self, query: &ClosureQuery) -> Result<Vec<RawClosureRow>, UnabError> {
        self.queries.lock().await.push(query.clone());
        let mut script = self.closure_script.lock().await;
        if script.is_empty() {
            Ok(Vec::new())
        } else {
            script.remove(0)
        }
    }

    async fn report_transaction(
        &self,
        report: &TransactionReport,
    ) -> Result<ReportAck, UnabError> {
        self.reports.lock().await.push(report.clone());
        let mut script = self.report_script.lock().await;
        if script.is_empty() {
            Ok(default_ack())
        } else {
            script.remove(0)
        }
    }

    async fn report_cancellation(&self, notice: &CancellationNotice) -> Result<(), UnabError> {
        if *self.fail_cancellations.lock().await {
            return Err(UnabError::Timeout);
        }
        self.cancellations.lock().await.push(notice.clone());
        Ok(())
    }
}
