// backend/src/routes/mod.rs

use axum::http::StatusCode;
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use crate::metrics::{ClientId, QueryError, TimeWindow, WindowError};
use crate::report::ReportPeriod;

pub mod auth;
pub mod charts;
pub mod health;
pub mod kpi;
pub mod reports;
pub mod users;

// Common error mappers
pub fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error = %e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("internal error: {e}"))
}

pub fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

pub fn store_error(e: QueryError) -> (StatusCode, String) {
    tracing::warn!(family = %e.family, error = %e.source, "metric store unavailable");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{} data unavailable", e.family),
    )
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .map_err(|e| format!("invalid date '{}': {}", s, e))
}

/// `?start=&end=&period=&client=` shared by every dashboard read.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    /// `custom` or a number of days ending today.
    pub period: Option<String>,
    pub client: Option<i64>,
}

impl WindowQuery {
    /// Inclusive dates; rejects malformed dates, bad periods and inverted ranges.
    pub fn dates(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), (StatusCode, String)> {
        let start = self
            .start
            .as_deref()
            .map(|s| parse_day(s.trim()))
            .transpose()
            .map_err(bad_request)?;
        let end = self
            .end
            .as_deref()
            .map(|s| parse_day(s.trim()))
            .transpose()
            .map_err(bad_request)?;
        let period = match self.period.as_deref() {
            Some(raw) => raw.parse::<ReportPeriod>().map_err(bad_request)?,
            None => ReportPeriod::Custom,
        };

        let (start, end) = period.resolve(today, start, end).map_err(bad_request)?;
        if start > end {
            return Err(bad_request(WindowError::Inverted { start, end }));
        }
        Ok((start, end))
    }

    pub fn window(&self, today: NaiveDate) -> Result<TimeWindow, (StatusCode, String)> {
        let (start, end) = self.dates(today)?;
        TimeWindow::from_dates(start, end).map_err(bad_request)
    }

    pub fn client(&self) -> Option<ClientId> {
        self.client.map(ClientId)
    }
}
