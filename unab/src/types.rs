//! Wire types for the UNAB reconciliation endpoint.
//!
//! Field names follow the upstream contract verbatim (Spanish), so these
//! structs serialize without rename gymnastics.

use crate::error::{RowError, UnabError};
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Task discriminator accepted by the single UNAB endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tarea {
    /// Query closures for a space over a date range.
    QueryClosures,
    /// Report a completed reservation or subscription.
    ReportTransaction,
    /// Report a cancellation of a previously reported event.
    ReportCancellation,
}

impl Tarea {
    /// The numeric code sent on the wire.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::QueryClosures => 2,
            Self::ReportTransaction => 3,
            Self::ReportCancellation => 4,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Tarea-2 request: closures for one space over a rolling window.
#[derive(Clone, Debug, Serialize)]
pub struct ClosureQuery {
    /// Building code of the space.
    pub codigo_edificio: String,
    /// Catalog code of the space.
    pub codigo_espacio: String,
    /// First date of the window, `YYYY-MM-DD`.
    pub fecha_desde: String,
    /// Last date of the window, `YYYY-MM-DD`.
    pub fecha_hasta: String,
}

impl ClosureQuery {
    /// Builds the query for a space's codes and a date window.
    #[must_use]
    pub fn new(building: &str, space: &str, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            codigo_edificio: building.to_string(),
            codigo_espacio: space.to_string(),
            fecha_desde: from.format("%Y-%m-%d").to_string(),
            fecha_hasta: to.format("%Y-%m-%d").to_string(),
        }
    }
}

/// One billed line inside a transaction report.
#[derive(Clone, Debug, Serialize)]
pub struct TransactionLine {
    /// Slot or coverage date, `YYYY-MM-DD`.
    pub fecha: String,
    /// Start time, `HH:MM`.
    pub hora_inicio: String,
    /// End time, `HH:MM`.
    pub hora_fin: String,
    /// Amount for the line.
    pub valor: i64,
}

/// Tarea-3 request: a completed reservation or subscription with its billing
/// identity and payment reference.
#[derive(Clone, Debug, Serialize)]
pub struct TransactionReport {
    /// Building code of the billed space.
    pub codigo_edificio: String,
    /// Catalog code of the billed space.
    pub codigo_espacio: String,
    /// Full name of the payer.
    pub nombre: String,
    /// National document number.
    pub documento: String,
    /// Contact email.
    pub correo: String,
    /// Street address.
    pub direccion: String,
    /// External city code.
    pub codigo_ciudad: String,
    /// External region code.
    pub codigo_region: String,
    /// Line items.
    pub detalle: Vec<TransactionLine>,
    /// Payment ticket id from the provider, when a payment exists.
    pub ticket: Option<String>,
    /// Total amount.
    pub total: i64,
}

/// Tarea-4 request: cancel a previously reported event.
#[derive(Clone, Debug, Serialize)]
pub struct CancellationNotice {
    /// The event code UNAB assigned when the transaction was reported.
    pub codigo_evento: String,
}

// ============================================================================
// Responses
// ============================================================================

/// The `{estado, mensaje, datos}` response envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope {
    /// `"success"` or a failure marker.
    pub estado: String,
    /// Human-readable message.
    #[serde(default)]
    pub mensaje: Option<String>,
    /// Task-specific payload.
    #[serde(default)]
    pub datos: Option<Value>,
}

impl Envelope {
    /// Normalizes the two observed response shapes: a bare envelope object,
    /// or the same object wrapped in a single-element array.
    ///
    /// # Errors
    ///
    /// Returns [`UnabError::MalformedResponse`] for anything else.
    pub fn from_value(value: Value) -> Result<Self, UnabError> {
        let inner = match value {
            Value::Array(mut items) => {
                if items.is_empty() {
                    return Err(UnabError::MalformedResponse("empty array response".into()));
                }
                items.swap_remove(0)
            }
            other => other,
        };
        serde_json::from_value(inner).map_err(|e| UnabError::MalformedResponse(e.to_string()))
    }

    /// True when `estado` marks success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.estado.eq_ignore_ascii_case("success")
    }
}

/// Identity-linking fields echoed back by a successful tarea-3 call.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ReportAck {
    /// External person id, persisted so later calls can reference it.
    #[serde(default)]
    pub codigo_persona: Option<String>,
    /// External event code, required for a later cancellation notice.
    #[serde(default)]
    pub codigo_evento: Option<String>,
}

/// A closure row exactly as UNAB returns it: everything optional, flags in
/// whatever scalar shape the upstream felt like sending.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawClosureRow {
    /// Range start, `YYYY-MM-DD`.
    #[serde(default)]
    pub fecha_inicio: Option<String>,
    /// Range end, `YYYY-MM-DD`.
    #[serde(default)]
    pub fecha_fin: Option<String>,
    /// Daily start time, `HH:MM`.
    #[serde(default)]
    pub hora_inicio: Option<String>,
    /// Daily end time, `HH:MM`.
    #[serde(default)]
    pub hora_fin: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub descripcion: Option<String>,
    /// Monday flag.
    #[serde(default, deserialize_with = "de_flag")]
    pub lunes: bool,
    /// Tuesday flag.
    #[serde(default, deserialize_with = "de_flag")]
    pub martes: bool,
    /// Wednesday flag.
    #[serde(default, deserialize_with = "de_flag")]
    pub miercoles: bool,
    /// Thursday flag.
    #[serde(default, deserialize_with = "de_flag")]
    pub jueves: bool,
    /// Friday flag.
    #[serde(default, deserialize_with = "de_flag")]
    pub viernes: bool,
    /// Saturday flag.
    #[serde(default, deserialize_with = "de_flag")]
    pub sabado: bool,
    /// Sunday flag.
    #[serde(default, deserialize_with = "de_flag")]
    pub domingo: bool,
}

impl RawClosureRow {
    /// Validates the row into a typed [`ClosureRecord`].
    ///
    /// # Errors
    ///
    /// Returns a [`RowError`] naming the first offending field; the sync job
    /// logs it and skips the row.
    pub fn validate(&self) -> Result<ClosureRecord, RowError> {
        let start_date = parse_date(self.fecha_inicio.as_deref(), "fecha_inicio")?;
        let end_date = parse_date(self.fecha_fin.as_deref(), "fecha_fin")?;
        if end_date < start_date {
            return Err(RowError::InvertedRange(
                start_date.to_string(),
                end_date.to_string(),
            ));
        }
        let starts_at = parse_time(self.hora_inicio.as_deref(), "hora_inicio")?;
        let ends_at = parse_time(self.hora_fin.as_deref(), "hora_fin")?;

        Ok(ClosureRecord {
            start_date,
            end_date,
            starts_at,
            ends_at,
            description: self.descripcion.clone().unwrap_or_default(),
            weekdays: [
                self.lunes,
                self.martes,
                self.miercoles,
                self.jueves,
                self.viernes,
                self.sabado,
                self.domingo,
            ],
        })
    }
}

/// A validated closure record from the external calendar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureRecord {
    /// First day of the range.
    pub start_date: NaiveDate,
    /// Last day of the range, inclusive.
    pub end_date: NaiveDate,
    /// Daily start time.
    pub starts_at: NaiveTime,
    /// Daily end time.
    pub ends_at: NaiveTime,
    /// Free-text description.
    pub description: String,
    /// Per-weekday applicability, Monday first. All-false means every day.
    pub weekdays: [bool; 7],
}

impl ClosureRecord {
    /// Whether the record applies on `date`: inside the range, and either
    /// flagged for that weekday or carrying no flags at all.
    #[must_use]
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if date < self.start_date || date > self.end_date {
            return false;
        }
        if self.weekdays.iter().all(|f| !f) {
            return true;
        }
        let idx = date.weekday().num_days_from_monday() as usize;
        self.weekdays.get(idx).copied().unwrap_or(false)
    }

    /// The individual calendar days inside `[from, to]` this record expands
    /// to, honoring the weekday flags.
    pub fn days_within(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = NaiveDate> + '_ {
        let start = self.start_date.max(from);
        let end = self.end_date.min(to);
        start
            .iter_days()
            .take_while(move |d| *d <= end)
            .filter(|d| self.applies_on(*d))
    }
}

fn parse_date(value: Option<&str>, field: &'static str) -> Result<NaiveDate, RowError> {
    let raw = value.ok_or(RowError::MissingField(field))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| RowError::BadDate(raw.to_string()))
}

fn parse_time(value: Option<&str>, field: &'static str) -> Result<NaiveTime, RowError> {
    let raw = value.ok_or(RowError::MissingField(field))?;
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| RowError::BadTime(raw.to_string()))
}

/// Accepts `1`/`0`, `true`/`false`, and `"1"`/`"0"`/`"true"` for the weekday
/// flags; the upstream is not consistent about it.
fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.trim(), "1" | "true" | "TRUE" | "True"),
        _ => false,
    })
}
