//! Permit validity ("vigencia") arithmetic.
//!
//! Everything here is a pure function of its inputs: the caller supplies the
//! current local date-time, so the same inputs always give the same summary.
//! Dates are compared at local calendar-day granularity; a daylight-saving
//! shift or a client in another time zone can move a result by one day.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Days before expiry at which a permit is flagged as critical.
pub const CRITICAL_WINDOW_DAYS: i64 = 7;

/// Validity summary of a permit as of a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VigenciaInfo {
    /// Whole days since issuance, never negative.
    pub dias_transcurridos: i64,
    /// Days left until expiry (rounded up), never negative.
    pub dias_restantes: i64,
    /// Days past expiry, 0 while valid.
    pub dias_vencido: i64,
    /// Share of the validity period already elapsed, in [0, 100].
    pub porcentaje_transcurrido: f64,
    pub esta_vencido: bool,
    pub esta_critico: bool,
}

/// How a summary should be highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

/// Human readable rendering of a [`VigenciaInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VigenciaLabel {
    pub texto: String,
    pub severidad: Severity,
}

/// Computes the validity summary of a permit.
///
/// Returns the neutral all-zero summary when the record carries no permit
/// (either input absent, or a zero-day period).
pub fn compute(
    fecha_emision: Option<NaiveDate>,
    vigencia_dias: Option<i64>,
    now: NaiveDateTime,
) -> VigenciaInfo {
    let (Some(fecha_emision), Some(vigencia_dias)) = (fecha_emision, vigencia_dias) else {
        return VigenciaInfo::default();
    };
    if vigencia_dias == 0 {
        return VigenciaInfo::default();
    }

    let emitted_at = fecha_emision.and_time(NaiveTime::MIN);
    let expires_at = expiration_date(fecha_emision, vigencia_dias).and_time(NaiveTime::MIN);

    let elapsed_ms = (now - emitted_at).num_milliseconds();
    let remaining_ms = (expires_at - now).num_milliseconds();

    let raw_transcurridos = elapsed_ms.div_euclid(DAY_MS);
    let raw_restantes = ceil_days(remaining_ms);

    let esta_vencido = remaining_ms < 0;
    let esta_critico = !esta_vencido && raw_restantes <= CRITICAL_WINDOW_DAYS;

    let porcentaje = (raw_transcurridos as f64 / vigencia_dias as f64) * 100.0;

    VigenciaInfo {
        dias_transcurridos: raw_transcurridos.max(0),
        dias_restantes: raw_restantes.max(0),
        dias_vencido: (-raw_restantes).max(0),
        porcentaje_transcurrido: porcentaje.clamp(0.0, 100.0),
        esta_vencido,
        esta_critico,
    }
}

/// [`compute`] against the current local time.
pub fn compute_today(fecha_emision: Option<NaiveDate>, vigencia_dias: Option<i64>) -> VigenciaInfo {
    compute(fecha_emision, vigencia_dias, Local::now().naive_local())
}

/// Date on which a permit issued on `fecha_emision` stops being valid.
pub fn expiration_date(fecha_emision: NaiveDate, vigencia_dias: i64) -> NaiveDate {
    TimeDelta::try_days(vigencia_dias)
        .and_then(|period| fecha_emision.checked_add_signed(period))
        .unwrap_or(if vigencia_dias < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Parses an issuance date as stored by NocoDB or sent by the dashboard.
///
/// Accepts `YYYY-MM-DD` and RFC 3339 date-times; only the calendar date is kept.
pub fn parse_issue_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            value
                .get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

/// Maps a summary to its label and severity.
pub fn describe(info: &VigenciaInfo) -> VigenciaLabel {
    if info.esta_vencido {
        let texto = match info.dias_vencido {
            0 => "Vencido hoy".to_string(),
            1 => "Vencido hace 1 día".to_string(),
            n => format!("Vencido hace {} días", n),
        };
        return VigenciaLabel {
            texto,
            severidad: Severity::Error,
        };
    }

    if info.esta_critico {
        let texto = match info.dias_restantes {
            0 => "¡Vence hoy!".to_string(),
            1 => "¡Vence mañana!".to_string(),
            n => format!("¡Vence en {} días!", n),
        };
        return VigenciaLabel {
            texto,
            severidad: Severity::Warning,
        };
    }

    let texto = match info.dias_restantes {
        1 => "Válido por 1 día más".to_string(),
        n => format!("Válido por {} días más", n),
    };
    VigenciaLabel {
        texto,
        severidad: Severity::Ok,
    }
}

/// Highlight of the elapsed-time progress bar.
pub fn progress_severity(info: &VigenciaInfo) -> Severity {
    if info.esta_vencido {
        Severity::Error
    } else if info.esta_critico {
        Severity::Warning
    } else {
        Severity::Ok
    }
}

/// Label shown for records that hold no permit at all.
pub fn no_permit_label() -> VigenciaLabel {
    VigenciaLabel {
        texto: "Sin permiso".to_string(),
        severidad: Severity::Warning,
    }
}

fn ceil_days(ms: i64) -> i64 {
    -(-ms).div_euclid(DAY_MS)
}
