//! UNAB reconciliation client.

use crate::error::UnabError;
use crate::types::{
    CancellationNotice, ClosureQuery, Envelope, RawClosureRow, ReportAck, Tarea, TransactionReport,
};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Connection settings for the reconciliation service, injected at process
/// start instead of read ad hoc from the environment.
#[derive(Clone, Debug)]
pub struct UnabConfig {
    /// Endpoint URL (single endpoint for all task codes).
    pub base_url: String,
    /// Basic Auth username.
    pub username: String,
    /// Basic Auth password.
    pub password: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
}

impl UnabConfig {
    /// Config with the standard 5s connect / 30s total timeouts.
    #[must_use]
    pub fn new(base_url: String, username: String, password: String) -> Self {
        Self {
            base_url,
            username,
            password,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Client for the UNAB endpoint.
#[derive(Clone)]
pub struct UnabClient {
    client: Client,
    config: UnabConfig,
}

impl UnabClient {
    /// Builds a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`UnabError::Build`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: UnabConfig) -> Result<Self, UnabError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| UnabError::Build(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Queries closures for a space over a date window (tarea 2).
    ///
    /// Returns the raw rows; callers validate each row so malformed records
    /// can be skipped individually.
    ///
    /// # Errors
    ///
    /// Returns a [`UnabError`] for transport, auth, envelope or task-status
    /// failures.
    pub async fn query_closures(
        &self,
        query: &ClosureQuery,
    ) -> Result<Vec<RawClosureRow>, UnabError> {
        let envelope = self.post_task(Tarea::QueryClosures, query).await?;
        match envelope.datos {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(datos) => serde_json::from_value(datos)
                .map_err(|e| UnabError::MalformedResponse(e.to_string())),
        }
    }

    /// Reports a completed reservation or subscription (tarea 3).
    ///
    /// On success the ack carries the identity-linking fields UNAB echoes
    /// back (`codigo_persona`, `codigo_evento`).
    ///
    /// # Errors
    ///
    /// Returns a [`UnabError`] for transport, auth, envelope or task-status
    /// failures.
    pub async fn report_transaction(
        &self,
        report: &TransactionReport,
    ) -> Result<ReportAck, UnabError> {
        let envelope = self.post_task(Tarea::ReportTransaction, report).await?;
        match envelope.datos {
            None | Some(Value::Null) => Ok(ReportAck::default()),
            Some(datos) => {
                // Some deployments wrap the ack in the same one-element array
                // shape as the envelope itself.
                let inner = match datos {
                    Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
                    other => other,
                };
                serde_json::from_value(inner)
                    .map_err(|e| UnabError::MalformedResponse(e.to_string()))
            }
        }
    }

    /// Reports a cancellation of a previously reported event (tarea 4).
    ///
    /// # Errors
    ///
    /// Returns a [`UnabError`] for transport, auth, envelope or task-status
    /// failures.
    pub async fn report_cancellation(&self, notice: &CancellationNotice) -> Result<(), UnabError> {
        self.post_task(Tarea::ReportCancellation, notice).await?;
        Ok(())
    }

    async fn post_task<T: Serialize>(&self, tarea: Tarea, body: &T) -> Result<Envelope, UnabError> {
        let mut payload =
            serde_json::to_value(body).map_err(|e| UnabError::MalformedResponse(e.to_string()))?;
        if let Value::Object(map) = &mut payload {
            map.insert("tarea".into(), Value::from(tarea.code()));
        }

        let response = self
            .client
            .post(&self.config.base_url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UnabError::Timeout
                } else {
                    UnabError::Transport(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(UnabError::Unauthorized),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(UnabError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
            _ => {
                let value: Value = response
                    .json()
                    .await
                    .map_err(|e| UnabError::MalformedResponse(e.to_string()))?;
                let envelope = Envelope::from_value(value)?;
                if envelope.is_success() {
                    Ok(envelope)
                } else {
                    Err(UnabError::TaskRejected {
                        mensaje: envelope
                            .mensaje
                            .unwrap_or_else(|| envelope.estado.clone()),
                    })
                }
            }
        }
    }
}
