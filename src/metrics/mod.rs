// backend/src/metrics/mod.rs
//
// Metric query layer: windowed aggregates over the laundry's production,
// consumption, chemical dosage and alarm records.

use std::fmt;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    ActiveAlarm, AlarmAggregate, AlarmFrequency, ChemicalAggregate, ChemicalUsage,
    EfficiencyAggregate, EfficiencyPoint, LoadBreakdown, ProductionAggregate, WaterAggregate,
};

#[cfg(test)]
pub mod fixture;
pub mod postgres;

pub use postgres::PgMetricStore;

/// Open alarms listed in the alarm table are at most this old.
pub const ACTIVE_ALARM_TABLE_DAYS: i64 = 7;

/// Half-open interval `[start, end)` over record timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
    #[error("date {0} is out of range")]
    OutOfRange(NaiveDate),
}

impl TimeWindow {
    /// Covers every instant of the inclusive date range `start..=end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        let after_end = end.succ_opt().ok_or(WindowError::OutOfRange(end))?;
        Ok(Self {
            start: start.and_time(NaiveTime::MIN),
            end: after_end.and_time(NaiveTime::MIN),
        })
    }

    /// The `length` leading up to `now`.
    pub fn trailing(now: NaiveDateTime, length: Duration) -> Self {
        Self {
            start: now - length,
            end: now,
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    #[cfg(test)]
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Restricts aggregation to a single client; `None` means all clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub i64);

/// Lower bound for the "active alarms" count: midnight of the previous day.
///
/// This bound does not follow the caller's window; the dashboard has always
/// counted active alarms over this fixed recency period.
pub fn active_alarm_since(now: NaiveDateTime) -> NaiveDateTime {
    now.date().and_time(NaiveTime::MIN) - Duration::days(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    Production,
    Water,
    Chemical,
    Efficiency,
    ActiveAlarms,
    Alarms,
    ChemicalBreakdown,
    ProductionByClient,
    ProductionByProgram,
    TopAlarms,
    EfficiencySeries,
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricFamily::Production => "production",
            MetricFamily::Water => "water",
            MetricFamily::Chemical => "chemical",
            MetricFamily::Efficiency => "efficiency",
            MetricFamily::ActiveAlarms => "active_alarms",
            MetricFamily::Alarms => "alarms",
            MetricFamily::ChemicalBreakdown => "chemical_breakdown",
            MetricFamily::ProductionByClient => "production_by_client",
            MetricFamily::ProductionByProgram => "production_by_program",
            MetricFamily::TopAlarms => "top_alarms",
            MetricFamily::EfficiencySeries => "efficiency_series",
        };
        f.write_str(name)
    }
}

/// The store could not answer. An empty range is never an error.
#[derive(Debug, Error)]
#[error("{family} query failed: {source}")]
pub struct QueryError {
    pub family: MetricFamily,
    #[source]
    pub source: sqlx::Error,
}

impl QueryError {
    pub fn new(family: MetricFamily, source: sqlx::Error) -> Self {
        Self { family, source }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Read-only access to the plant's record families.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Weight and cycle totals; rows with a non-positive weight are ignored.
    async fn production_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<ProductionAggregate>;

    async fn water_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<WaterAggregate>;

    async fn chemical_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<ChemicalAggregate>;

    /// Mean of `production / (production + downtime) * 100` over records with
    /// positive production time and non-negative downtime.
    async fn efficiency_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<EfficiencyAggregate>;

    /// Uncleared alarms that started at or after `since`.
    async fn active_alarm_count(&self, since: NaiveDateTime) -> QueryResult<i64>;

    /// Cleared alarms started inside the window.
    async fn alarm_aggregate(&self, window: TimeWindow) -> QueryResult<AlarmAggregate>;

    async fn chemical_breakdown(&self, window: TimeWindow) -> QueryResult<Vec<ChemicalUsage>>;

    async fn production_by_client(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<Vec<LoadBreakdown>>;

    async fn production_by_program(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<Vec<LoadBreakdown>>;

    async fn top_alarms(&self, window: TimeWindow, limit: i64)
        -> QueryResult<Vec<AlarmFrequency>>;

    async fn active_alarms(&self, now: NaiveDateTime, limit: i64) -> QueryResult<Vec<ActiveAlarm>>;

    async fn efficiency_series(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<Vec<EfficiencyPoint>>;
}

/// Product name for a dosage channel.
pub fn chemical_label(code: &str) -> String {
    let product = match code {
        "Q1" => "Detergente Principal",
        "Q2" => "Detergente Secundário",
        "Q3" => "Alvejante",
        "Q4" => "Amaciante",
        "Q5" => "Neutralizante",
        other => return format!("Químico {other}"),
    };
    format!("{product} ({code})")
}
