// backend/src/kpi/mod.rs
//
// Turns raw metric aggregates into named, display-ready KPI values.

pub mod format;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::metrics::{
    active_alarm_since, ClientId, MetricFamily, MetricStore, QueryResult, TimeWindow,
};
use crate::models::{ChemicalAggregate, EfficiencyAggregate, ProductionAggregate, WaterAggregate};
use format::{abbreviate, format_fixed, format_thousands};

pub const ACTIVE_ALARMS: &str = "active_alarms";

/// Length of the "today" scope, ending at the moment of the request.
pub const TODAY_SPAN_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub name: &'static str,
    pub raw: f64,
    pub formatted: String,
    pub unit: &'static str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KpiSet {
    pub kpis: BTreeMap<&'static str, Kpi>,
    /// Metric families whose query failed; their KPIs read as zero.
    pub unavailable: Vec<MetricFamily>,
}

impl KpiSet {
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Kpi> {
        self.kpis.get(name)
    }

    /// Raw value, 0 for unknown names.
    #[cfg(test)]
    pub fn raw(&self, name: &str) -> f64 {
        self.get(name).map_or(0.0, |k| k.raw)
    }

    #[cfg(test)]
    pub fn formatted(&self, name: &str) -> Option<&str> {
        self.get(name).map(|k| k.formatted.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.unavailable.is_empty()
    }

    fn insert(&mut self, name: &'static str, raw: f64, formatted: String, unit: &'static str) {
        self.kpis.insert(
            name,
            Kpi {
                name,
                raw,
                formatted,
                unit,
            },
        );
    }

    fn insert_scope(&mut self, names: &ScopeNames, totals: &ScopeTotals) {
        let p = &totals.production;
        self.insert(names.weight_kg, p.total_weight_kg, abbreviate(p.total_weight_kg), "kg");
        self.insert(
            names.cycles,
            p.cycle_count as f64,
            format_thousands(p.cycle_count as f64),
            "ciclos",
        );

        let w = &totals.water;
        self.insert(names.water_liters, w.total_liters, abbreviate(w.total_liters), "L");
        self.insert(
            names.water_per_kg,
            w.liters_per_kg,
            format_fixed(w.liters_per_kg, format::WATER_RATIO_PLACES as usize),
            "L/kg",
        );

        let c = &totals.chemical;
        self.insert(names.chemical_kg, c.total_chemical_kg, format_fixed(c.total_chemical_kg, 1), "kg");
        self.insert(
            names.chemical_per_kg,
            c.chemical_per_kg,
            format_fixed(c.chemical_per_kg, format::CHEMICAL_RATIO_PLACES as usize),
            "kg/kg",
        );

        let e = &totals.efficiency;
        self.insert(names.efficiency, e.average_percent, format_fixed(e.average_percent, 1), "%");
    }

    fn mark_unavailable(&mut self, family: MetricFamily) {
        if !self.unavailable.contains(&family) {
            self.unavailable.push(family);
        }
    }
}

pub struct ScopeNames {
    pub weight_kg: &'static str,
    pub cycles: &'static str,
    pub water_liters: &'static str,
    pub water_per_kg: &'static str,
    pub chemical_kg: &'static str,
    pub chemical_per_kg: &'static str,
    pub efficiency: &'static str,
}

pub const TODAY: ScopeNames = ScopeNames {
    weight_kg: "today_weight_kg",
    cycles: "today_cycles",
    water_liters: "today_water_liters",
    water_per_kg: "today_water_per_kg",
    chemical_kg: "today_chemical_kg",
    chemical_per_kg: "today_chemical_per_kg",
    efficiency: "today_efficiency",
};

pub const PERIOD: ScopeNames = ScopeNames {
    weight_kg: "period_weight_kg",
    cycles: "period_cycles",
    water_liters: "period_water_liters",
    water_per_kg: "period_water_per_kg",
    chemical_kg: "period_chemical_kg",
    chemical_per_kg: "period_chemical_per_kg",
    efficiency: "period_efficiency",
};

/// The four window-scoped aggregates behind one KPI scope.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScopeTotals {
    pub production: ProductionAggregate,
    pub water: WaterAggregate,
    pub chemical: ChemicalAggregate,
    pub efficiency: EfficiencyAggregate,
}

pub struct ScopeResults {
    production: QueryResult<ProductionAggregate>,
    water: QueryResult<WaterAggregate>,
    chemical: QueryResult<ChemicalAggregate>,
    efficiency: QueryResult<EfficiencyAggregate>,
}

impl ScopeResults {
    /// Fails on the first family that could not be read.
    pub fn into_totals(self) -> QueryResult<ScopeTotals> {
        Ok(ScopeTotals {
            production: self.production?,
            water: self.water?,
            chemical: self.chemical?,
            efficiency: self.efficiency?,
        })
    }

    fn settle_into(self, set: &mut KpiSet) -> ScopeTotals {
        ScopeTotals {
            production: settle(self.production, set),
            water: settle(self.water, set),
            chemical: settle(self.chemical, set),
            efficiency: settle(self.efficiency, set),
        }
    }
}

fn settle<T: Default>(result: QueryResult<T>, set: &mut KpiSet) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(family = %err.family, error = %err.source, "metric query failed, reporting zeros");
            set.mark_unavailable(err.family);
            T::default()
        }
    }
}

pub async fn fetch_scope(
    store: &dyn MetricStore,
    window: TimeWindow,
    client: Option<ClientId>,
) -> ScopeResults {
    let (production, water, chemical, efficiency) = tokio::join!(
        store.production_aggregate(window, client),
        store.water_aggregate(window, client),
        store.chemical_aggregate(window, client),
        store.efficiency_aggregate(window, client),
    );
    ScopeResults {
        production,
        water,
        chemical,
        efficiency,
    }
}

#[derive(Clone)]
pub struct KpiService {
    store: Arc<dyn MetricStore>,
}

impl KpiService {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { store }
    }

    pub async fn compute_kpis(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        client: Option<ClientId>,
    ) -> KpiSet {
        self.compute_kpis_at(Local::now().naive_local(), start, end, client)
            .await
    }

    /// Never fails: an inverted range yields all zeros without touching the
    /// store, and failed families are zero-filled and listed as unavailable.
    #[instrument(skip(self))]
    pub async fn compute_kpis_at(
        &self,
        now: NaiveDateTime,
        start: NaiveDate,
        end: NaiveDate,
        client: Option<ClientId>,
    ) -> KpiSet {
        let mut set = KpiSet::default();

        let period = match TimeWindow::from_dates(start, end) {
            Ok(window) => window,
            Err(err) => {
                debug!(%err, "empty KPI range");
                set.insert_scope(&TODAY, &ScopeTotals::default());
                set.insert_scope(&PERIOD, &ScopeTotals::default());
                set.insert(ACTIVE_ALARMS, 0.0, format_thousands(0.0), "alarmes");
                return set;
            }
        };
        let today = TimeWindow::trailing(now, Duration::hours(TODAY_SPAN_HOURS));

        let store = self.store.as_ref();
        let (today_results, period_results, active) = tokio::join!(
            fetch_scope(store, today, client),
            fetch_scope(store, period, client),
            store.active_alarm_count(active_alarm_since(now)),
        );

        let today_totals = today_results.settle_into(&mut set);
        let period_totals = period_results.settle_into(&mut set);
        let active = settle(active, &mut set);

        set.insert_scope(&TODAY, &today_totals);
        set.insert_scope(&PERIOD, &period_totals);
        set.insert(ACTIVE_ALARMS, active as f64, format_thousands(active as f64), "alarmes");

        debug!(unavailable = set.unavailable.len(), "KPIs computed");
        set
    }
}
