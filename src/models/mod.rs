// backend/src/models/mod.rs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::kpi::format::{chemical_per_kg, kg_per_cycle, liters_per_kg, round_to};

// ───────────────────────────────────────
// Raw aggregates (one per metric family)
// ───────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProductionAggregate {
    pub total_weight_kg: f64,
    pub cycle_count: i64,
    pub avg_weight_per_cycle: f64,
}

impl ProductionAggregate {
    pub fn from_totals(total_weight_kg: f64, cycle_count: i64) -> Self {
        Self {
            total_weight_kg,
            cycle_count,
            avg_weight_per_cycle: kg_per_cycle(total_weight_kg, cycle_count),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WaterAggregate {
    pub total_liters: f64,
    pub liters_per_kg: f64,
}

impl WaterAggregate {
    pub fn from_totals(total_liters: f64, total_weight_kg: f64) -> Self {
        Self {
            total_liters,
            liters_per_kg: liters_per_kg(total_liters, total_weight_kg),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChemicalAggregate {
    pub total_chemical_kg: f64,
    pub chemical_per_kg: f64,
}

impl ChemicalAggregate {
    pub fn from_totals(total_chemical_kg: f64, total_weight_kg: f64) -> Self {
        Self {
            total_chemical_kg,
            chemical_per_kg: chemical_per_kg(total_chemical_kg, total_weight_kg),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EfficiencyAggregate {
    pub average_percent: f64,
    pub record_count: i64,
}

impl EfficiencyAggregate {
    pub fn new(average_percent: Option<f64>, record_count: i64) -> Self {
        Self {
            average_percent: round_to(average_percent.unwrap_or(0.0), 1),
            record_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AlarmAggregate {
    pub total: i64,
    pub critical_high: i64,
    pub avg_resolution_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChemicalUsage {
    pub code: String,
    pub label: String,
    pub quantity_kg: f64,
    pub cycles: i64,
    pub avg_per_cycle_kg: f64,
}

// ───────────────────────────────────────
// Chart series and tables
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct EfficiencyPoint {
    pub timestamp: NaiveDateTime,
    pub efficiency_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct LoadBreakdown {
    pub id: i64,
    pub label: String,
    pub loads: i64,
    pub total_weight_kg: f64,
    pub avg_weight_per_load: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AlarmFrequency {
    pub tag: Option<String>,
    pub message: Option<String>,
    pub area: Option<String>,
    pub frequency: i64,
    pub avg_duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAlarm {
    pub tag: Option<String>,
    pub message: Option<String>,
    pub area: Option<String>,
    pub priority: Option<i32>,
    pub priority_label: &'static str,
    pub started_at: NaiveDateTime,
    pub open_minutes: i64,
    pub open_for: String,
}

impl ActiveAlarm {
    pub fn from_row(row: ActiveAlarmRow, now: NaiveDateTime) -> Self {
        let open_minutes = (now - row.started_at).num_minutes().max(0);
        Self {
            priority_label: priority_label(row.priority),
            open_for: open_duration(open_minutes),
            tag: row.tag,
            message: row.message,
            area: row.area,
            priority: row.priority,
            started_at: row.started_at,
            open_minutes,
        }
    }
}

pub fn priority_label(priority: Option<i32>) -> &'static str {
    match priority {
        Some(1) => "Crítico",
        Some(2) => "Alto",
        Some(3) => "Médio",
        Some(4) => "Baixo",
        Some(5) => "Info",
        _ => "Desconhecida",
    }
}

fn open_duration(minutes: i64) -> String {
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m")
    }
}

// ───────────────────────────────────────
// Rows as returned by the store
// ───────────────────────────────────────
#[derive(Debug, FromRow)]
pub struct ProductionTotalsRow {
    pub total_weight_kg: f64,
    pub cycle_count: i64,
}

#[derive(Debug, FromRow)]
pub struct ConsumptionTotalsRow {
    pub consumed: f64,
    pub total_weight_kg: f64,
}

#[derive(Debug, FromRow)]
pub struct EfficiencyRow {
    pub average_percent: Option<f64>,
    pub record_count: i64,
}

#[derive(Debug, FromRow)]
pub struct AlarmTotalsRow {
    pub total: i64,
    pub critical_high: i64,
    pub avg_resolution_minutes: Option<f64>,
}

#[derive(Debug, FromRow)]
pub struct ChemicalDoseRow {
    pub code: String,
    pub quantity: f64,
    pub records: i64,
    pub avg_per_record: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ActiveAlarmRow {
    pub tag: Option<String>,
    pub message: Option<String>,
    pub area: Option<String>,
    pub priority: Option<i32>,
    pub started_at: NaiveDateTime,
}

// ───────────────────────────────────────
// DTOs helpful for endpoints
// ───────────────────────────────────────
#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResp {
    pub token: String,
    pub username: String,
    pub role: crate::auth::Role,
}
