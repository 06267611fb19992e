// backend/src/report/mod.rs
//
// Executive report: period-scoped production, consumption, chemical and alarm
// summaries plus the standing operational recommendations.

pub mod export;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::kpi::fetch_scope;
use crate::kpi::format::{round_to, safe_ratio};
use crate::metrics::{active_alarm_since, MetricStore, QueryError, TimeWindow};
use crate::models::{AlarmAggregate, ChemicalUsage};

pub const RECOMMENDATIONS: [&str; 4] = [
    "Manter consumo de água entre 12-18 L/kg para otimização",
    "Monitorar alarmes críticos para reduzir tempo de resolução",
    "Eficiência operacional acima de 85% indica boa performance",
    "Revisar consumo de químicos para possível otimização",
];

/// Window length used when the caller names no dates.
pub const DEFAULT_PERIOD_DAYS: u32 = 7;

/// Inclusive day count of `start..=end`, never below 1.
pub fn period_days(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(1)
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: NaiveDateTime,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub period_days: i64,
    #[serde(flatten)]
    pub body: Option<ReportBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportBody {
    pub production: ProductionSection,
    pub consumption: ConsumptionSection,
    pub chemicals: Vec<ChemicalUsage>,
    pub alarms: AlarmSection,
    pub recommendations: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductionSection {
    pub period_weight_kg: f64,
    pub period_cycles: i64,
    pub daily_avg_kg: f64,
    pub efficiency_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsumptionSection {
    pub water_liters: f64,
    pub water_per_kg: f64,
    pub chemical_kg: f64,
    pub chemical_per_kg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlarmSection {
    pub active_alarms: i64,
    pub period_alarms: i64,
    pub critical_high: i64,
    pub avg_resolution_minutes: f64,
}

impl Report {
    fn failed(now: NaiveDateTime, start: NaiveDate, end: NaiveDate, error: String) -> Self {
        Self {
            generated_at: now,
            period_start: start,
            period_end: end,
            period_days: period_days(start, end),
            body: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid period '{0}': expected 'custom' or a positive number of days")]
    Invalid(String),
    #[error("a {days}-day period ending {end} starts before the earliest supported date")]
    OutOfRange { days: u32, end: NaiveDate },
}

/// Period selector of the report screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    /// The N inclusive days ending today.
    Days(u32),
    /// Caller-supplied start and end dates.
    Custom,
}

impl FromStr for ReportPeriod {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("custom") {
            return Ok(ReportPeriod::Custom);
        }
        match s.parse::<u32>() {
            Ok(days) if days >= 1 => Ok(ReportPeriod::Days(days)),
            _ => Err(PeriodError::Invalid(s.to_string())),
        }
    }
}

impl ReportPeriod {
    /// Missing custom dates fall back to the default window ending today.
    pub fn resolve(
        self,
        today: NaiveDate,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(NaiveDate, NaiveDate), PeriodError> {
        match self {
            ReportPeriod::Days(days) => Ok((first_day(days, today)?, today)),
            ReportPeriod::Custom => {
                let end = end.unwrap_or(today);
                let start = match start {
                    Some(start) => start,
                    None => first_day(DEFAULT_PERIOD_DAYS, end)?,
                };
                Ok((start, end))
            }
        }
    }
}

/// First day of the `days` inclusive days ending `end`.
fn first_day(days: u32, end: NaiveDate) -> Result<NaiveDate, PeriodError> {
    end.checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .ok_or(PeriodError::OutOfRange { days, end })
}

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn MetricStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { store }
    }

    pub async fn build_report(&self, start: NaiveDate, end: NaiveDate) -> Report {
        self.build_report_at(Local::now().naive_local(), start, end)
            .await
    }

    /// Never fails: any unreadable family turns into an error report with no
    /// sections.
    #[instrument(skip(self))]
    pub async fn build_report_at(
        &self,
        now: NaiveDateTime,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Report {
        let window = match TimeWindow::from_dates(start, end) {
            Ok(window) => window,
            Err(err) => return Report::failed(now, start, end, err.to_string()),
        };

        match self.collect(now, window, period_days(start, end)).await {
            Ok(body) => {
                info!(
                    period_weight_kg = body.production.period_weight_kg,
                    chemicals = body.chemicals.len(),
                    "executive report built"
                );
                Report {
                    generated_at: now,
                    period_start: start,
                    period_end: end,
                    period_days: period_days(start, end),
                    body: Some(body),
                    error: None,
                }
            }
            Err(err) => {
                warn!(family = %err.family, error = %err.source, "executive report unavailable");
                Report::failed(
                    now,
                    start,
                    end,
                    format!("{} data unavailable", err.family),
                )
            }
        }
    }

    async fn collect(
        &self,
        now: NaiveDateTime,
        window: TimeWindow,
        days: i64,
    ) -> Result<ReportBody, QueryError> {
        let store = self.store.as_ref();
        let (scope, active, alarms, chemicals) = tokio::join!(
            fetch_scope(store, window, None),
            store.active_alarm_count(active_alarm_since(now)),
            store.alarm_aggregate(window),
            store.chemical_breakdown(window),
        );
        let totals = scope.into_totals()?;
        let alarms: AlarmAggregate = alarms?;

        Ok(ReportBody {
            production: ProductionSection {
                period_weight_kg: totals.production.total_weight_kg,
                period_cycles: totals.production.cycle_count,
                daily_avg_kg: round_to(safe_ratio(totals.production.total_weight_kg, days as f64), 1),
                efficiency_percent: totals.efficiency.average_percent,
            },
            consumption: ConsumptionSection {
                water_liters: totals.water.total_liters,
                water_per_kg: totals.water.liters_per_kg,
                chemical_kg: totals.chemical.total_chemical_kg,
                chemical_per_kg: totals.chemical.chemical_per_kg,
            },
            chemicals: chemicals?,
            alarms: AlarmSection {
                active_alarms: active?,
                period_alarms: alarms.total,
                critical_high: alarms.critical_high,
                avg_resolution_minutes: alarms.avg_resolution_minutes,
            },
            recommendations: RECOMMENDATIONS.to_vec(),
        })
    }
}
