// backend/src/metrics/fixture.rs
//
// In-memory store with the same filter rules as the SQL in `postgres.rs`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, NaiveTime};

use super::postgres::CLIENT_CHART_LIMIT;
use super::{
    chemical_label, ClientId, MetricStore, QueryResult, TimeWindow, ACTIVE_ALARM_TABLE_DAYS,
};
use crate::kpi::format::round_to;
use crate::models::{
    ActiveAlarm, ActiveAlarmRow, AlarmAggregate, AlarmFrequency, ChemicalAggregate,
    ChemicalUsage, EfficiencyAggregate, EfficiencyPoint, LoadBreakdown, ProductionAggregate,
    WaterAggregate,
};

#[derive(Debug, Clone)]
pub struct DailyRecord {
    pub at: NaiveDateTime,
    pub downtime: f64,
    pub production_time: f64,
    pub water_m3: f64,
    pub chemical_kg: f64,
    pub weight_kg: f64,
    pub client: i64,
}

impl DailyRecord {
    pub fn new(at: NaiveDateTime, weight_kg: f64) -> Self {
        Self {
            at,
            downtime: 0.0,
            production_time: 0.0,
            water_m3: 0.0,
            chemical_kg: 0.0,
            weight_kg,
            client: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlarmRecord {
    pub started_at: NaiveDateTime,
    pub cleared_at: Option<NaiveDateTime>,
    pub priority: i32,
    pub tag: String,
}

#[derive(Debug, Clone)]
pub struct DoseRecord {
    pub at: NaiveDateTime,
    /// Grams per channel, Q1..Q9.
    pub grams: [f64; 9],
}

/// One `Rel_Carga` load: program, client and weight.
#[derive(Debug, Clone)]
pub struct LoadRecord {
    pub at: NaiveDateTime,
    pub program: i64,
    pub client: i64,
    pub weight_kg: f64,
}

#[derive(Debug, Default)]
pub struct MemoryMetricStore {
    pub daily: Vec<DailyRecord>,
    pub alarms: Vec<AlarmRecord>,
    pub doses: Vec<DoseRecord>,
    pub loads: Vec<LoadRecord>,
    pub client_names: HashMap<i64, String>,
    pub program_names: HashMap<i64, String>,
}

impl MemoryMetricStore {
    fn weighed(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> impl Iterator<Item = &DailyRecord> {
        self.daily.iter().filter(move |r| {
            window.contains(r.at)
                && r.weight_kg > 0.0
                && client.map_or(true, |c| c.0 == r.client)
        })
    }

    /// Loads grouped by `key`, heaviest first.
    fn load_breakdown(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
        key: impl Fn(&LoadRecord) -> i64,
        label: impl Fn(i64) -> String,
    ) -> Vec<LoadBreakdown> {
        let mut groups: BTreeMap<i64, (i64, f64)> = BTreeMap::new();
        let loads = self
            .loads
            .iter()
            .filter(|l| window.contains(l.at) && client.map_or(true, |c| c.0 == l.client));
        for load in loads {
            let (count, total) = groups.entry(key(load)).or_default();
            *count += 1;
            *total += load.weight_kg;
        }

        let mut rows: Vec<LoadBreakdown> = groups
            .into_iter()
            .map(|(id, (loads, total))| LoadBreakdown {
                id,
                label: label(id),
                loads,
                total_weight_kg: total,
                avg_weight_per_load: total / loads as f64,
            })
            .collect();
        rows.sort_by(|a, b| b.total_weight_kg.total_cmp(&a.total_weight_kg));
        rows
    }
}

#[async_trait]
impl MetricStore for MemoryMetricStore {
    async fn production_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<ProductionAggregate> {
        let (weight, cycles) = self
            .weighed(window, client)
            .fold((0.0, 0), |(w, n), r| (w + r.weight_kg, n + 1));
        Ok(ProductionAggregate::from_totals(weight, cycles))
    }

    async fn water_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<WaterAggregate> {
        let (liters, weight) = self
            .weighed(window, client)
            .fold((0.0, 0.0), |(l, w), r| (l + r.water_m3 * 1000.0, w + r.weight_kg));
        Ok(WaterAggregate::from_totals(liters, weight))
    }

    async fn chemical_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<ChemicalAggregate> {
        let (chemical, weight) = self
            .weighed(window, client)
            .fold((0.0, 0.0), |(c, w), r| (c + r.chemical_kg, w + r.weight_kg));
        Ok(ChemicalAggregate::from_totals(chemical, weight))
    }

    async fn efficiency_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<EfficiencyAggregate> {
        let ratios: Vec<f64> = self
            .daily
            .iter()
            .filter(|r| {
                window.contains(r.at)
                    && r.production_time > 0.0
                    && r.downtime >= 0.0
                    && client.map_or(true, |c| c.0 == r.client)
            })
            .map(|r| r.production_time / (r.production_time + r.downtime) * 100.0)
            .collect();

        let average = if ratios.is_empty() {
            None
        } else {
            Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
        };
        Ok(EfficiencyAggregate::new(average, ratios.len() as i64))
    }

    async fn active_alarm_count(&self, since: NaiveDateTime) -> QueryResult<i64> {
        Ok(self
            .alarms
            .iter()
            .filter(|a| a.cleared_at.is_none() && a.started_at >= since)
            .count() as i64)
    }

    async fn alarm_aggregate(&self, window: TimeWindow) -> QueryResult<AlarmAggregate> {
        let cleared: Vec<(&AlarmRecord, NaiveDateTime)> = self
            .alarms
            .iter()
            .filter(|a| window.contains(a.started_at))
            .filter_map(|a| a.cleared_at.map(|c| (a, c)))
            .collect();

        let minutes: f64 = cleared
            .iter()
            .map(|(a, c)| (*c - a.started_at).num_seconds() as f64 / 60.0)
            .sum();
        let avg = if cleared.is_empty() {
            0.0
        } else {
            minutes / cleared.len() as f64
        };

        Ok(AlarmAggregate {
            total: cleared.len() as i64,
            critical_high: cleared.iter().filter(|(a, _)| a.priority <= 2).count() as i64,
            avg_resolution_minutes: round_to(avg, 1),
        })
    }

    async fn chemical_breakdown(&self, window: TimeWindow) -> QueryResult<Vec<ChemicalUsage>> {
        let mut usage = Vec::new();
        for channel in 0..9 {
            let amounts: Vec<f64> = self
                .doses
                .iter()
                .filter(|d| window.contains(d.at) && d.grams[channel] > 0.0)
                .map(|d| d.grams[channel])
                .collect();
            if amounts.is_empty() {
                continue;
            }
            let code = format!("Q{}", channel + 1);
            let total: f64 = amounts.iter().sum();
            usage.push(ChemicalUsage {
                label: chemical_label(&code),
                code,
                quantity_kg: total / 1000.0,
                cycles: amounts.len() as i64,
                avg_per_cycle_kg: total / amounts.len() as f64 / 1000.0,
            });
        }
        usage.sort_by(|a, b| b.quantity_kg.total_cmp(&a.quantity_kg));
        Ok(usage)
    }

    async fn production_by_client(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<Vec<LoadBreakdown>> {
        let mut rows = self.load_breakdown(
            window,
            client,
            |l| l.client,
            |id| {
                self.client_names
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| format!("Cliente {id}"))
            },
        );
        rows.truncate(CLIENT_CHART_LIMIT as usize);
        Ok(rows)
    }

    async fn production_by_program(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<Vec<LoadBreakdown>> {
        Ok(self.load_breakdown(
            window,
            client,
            |l| l.program,
            |id| {
                self.program_names
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| format!("Programa {id}"))
            },
        ))
    }

    async fn top_alarms(
        &self,
        window: TimeWindow,
        limit: i64,
    ) -> QueryResult<Vec<AlarmFrequency>> {
        let mut by_tag: Vec<AlarmFrequency> = Vec::new();
        for alarm in self.alarms.iter().filter(|a| window.contains(a.started_at)) {
            match by_tag.iter_mut().find(|f| f.tag.as_deref() == Some(&alarm.tag)) {
                Some(entry) => entry.frequency += 1,
                None => by_tag.push(AlarmFrequency {
                    tag: Some(alarm.tag.clone()),
                    message: None,
                    area: None,
                    frequency: 1,
                    avg_duration_minutes: None,
                }),
            }
        }
        by_tag.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        by_tag.truncate(limit.max(0) as usize);
        Ok(by_tag)
    }

    async fn active_alarms(&self, now: NaiveDateTime, limit: i64) -> QueryResult<Vec<ActiveAlarm>> {
        let since = now.date().and_time(NaiveTime::MIN) - Duration::days(ACTIVE_ALARM_TABLE_DAYS);
        let mut open: Vec<&AlarmRecord> = self
            .alarms
            .iter()
            .filter(|a| a.cleared_at.is_none() && a.started_at >= since)
            .collect();
        open.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.started_at.cmp(&a.started_at))
        });

        Ok(open
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|a| {
                let row = ActiveAlarmRow {
                    tag: Some(a.tag.clone()),
                    message: None,
                    area: None,
                    priority: Some(a.priority),
                    started_at: a.started_at,
                };
                ActiveAlarm::from_row(row, now)
            })
            .collect())
    }

    async fn efficiency_series(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<Vec<EfficiencyPoint>> {
        let mut points: Vec<EfficiencyPoint> = self
            .daily
            .iter()
            .filter(|r| {
                window.contains(r.at)
                    && r.production_time + r.downtime > 0.0
                    && client.map_or(true, |c| c.0 == r.client)
            })
            .map(|r| EfficiencyPoint {
                timestamp: r.at,
                efficiency_percent: round_to(
                    r.production_time / (r.production_time + r.downtime) * 100.0,
                    2,
                ),
            })
            .collect();
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}
