// backend/src/metrics/postgres.rs

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use sqlx::{query_as, query_scalar, PgPool};

use super::{
    chemical_label, ClientId, MetricFamily, MetricStore, QueryError, QueryResult, TimeWindow,
    ACTIVE_ALARM_TABLE_DAYS,
};
use crate::kpi::format::round_to;
use crate::models::{
    ActiveAlarm, ActiveAlarmRow, AlarmAggregate, AlarmFrequency, AlarmTotalsRow,
    ChemicalAggregate, ChemicalDoseRow, ChemicalUsage, ConsumptionTotalsRow, EfficiencyAggregate,
    EfficiencyPoint, EfficiencyRow, LoadBreakdown, ProductionAggregate, ProductionTotalsRow,
    WaterAggregate,
};

/// Load-by-client chart shows at most this many clients.
pub(super) const CLIENT_CHART_LIMIT: i64 = 15;

/// Dosage records are stored in grams.
const GRAMS_PER_KG: f64 = 1000.0;

#[derive(Clone)]
pub struct PgMetricStore {
    pool: PgPool,
}

impl PgMetricStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn client_key(client: Option<ClientId>) -> Option<i64> {
    client.map(|c| c.0)
}

#[async_trait]
impl MetricStore for PgMetricStore {
    async fn production_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<ProductionAggregate> {
        let row = query_as::<_, ProductionTotalsRow>(
            r#"SELECT COALESCE(SUM("C4"), 0)::float8 AS total_weight_kg,
                      COUNT(*)                       AS cycle_count
                 FROM "Rel_Diario"
                WHERE "Time_Stamp" >= $1 AND "Time_Stamp" < $2
                  AND "C4" > 0
                  AND ($3::int8 IS NULL OR "C5" = $3)"#,
        )
        .bind(window.start())
        .bind(window.end())
        .bind(client_key(client))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::Production, e))?;

        Ok(ProductionAggregate::from_totals(row.total_weight_kg, row.cycle_count))
    }

    async fn water_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<WaterAggregate> {
        // C2 is metered in cubic meters.
        let row = query_as::<_, ConsumptionTotalsRow>(
            r#"SELECT COALESCE(SUM("C2" * 1000), 0)::float8 AS consumed,
                      COALESCE(SUM("C4"), 0)::float8        AS total_weight_kg
                 FROM "Rel_Diario"
                WHERE "Time_Stamp" >= $1 AND "Time_Stamp" < $2
                  AND "C4" > 0
                  AND ($3::int8 IS NULL OR "C5" = $3)"#,
        )
        .bind(window.start())
        .bind(window.end())
        .bind(client_key(client))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::Water, e))?;

        Ok(WaterAggregate::from_totals(row.consumed, row.total_weight_kg))
    }

    async fn chemical_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<ChemicalAggregate> {
        let row = query_as::<_, ConsumptionTotalsRow>(
            r#"SELECT COALESCE(SUM("C3"), 0)::float8 AS consumed,
                      COALESCE(SUM("C4"), 0)::float8 AS total_weight_kg
                 FROM "Rel_Diario"
                WHERE "Time_Stamp" >= $1 AND "Time_Stamp" < $2
                  AND "C4" > 0
                  AND ($3::int8 IS NULL OR "C5" = $3)"#,
        )
        .bind(window.start())
        .bind(window.end())
        .bind(client_key(client))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::Chemical, e))?;

        Ok(ChemicalAggregate::from_totals(row.consumed, row.total_weight_kg))
    }

    async fn efficiency_aggregate(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<EfficiencyAggregate> {
        let row = query_as::<_, EfficiencyRow>(
            r#"SELECT AVG("C1"::float8 / ("C1" + "C0")::float8 * 100)::float8 AS average_percent,
                      COUNT(*)                                                AS record_count
                 FROM "Rel_Diario"
                WHERE "Time_Stamp" >= $1 AND "Time_Stamp" < $2
                  AND "C1" > 0 AND "C0" >= 0
                  AND ($3::int8 IS NULL OR "C5" = $3)"#,
        )
        .bind(window.start())
        .bind(window.end())
        .bind(client_key(client))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::Efficiency, e))?;

        Ok(EfficiencyAggregate::new(row.average_percent, row.record_count))
    }

    async fn active_alarm_count(&self, since: NaiveDateTime) -> QueryResult<i64> {
        query_scalar::<_, i64>(
            r#"SELECT COUNT(*)
                 FROM "ALARMHISTORY"
                WHERE "Al_Norm_Time" IS NULL
                  AND "Al_Start_Time" >= $1"#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::ActiveAlarms, e))
    }

    async fn alarm_aggregate(&self, window: TimeWindow) -> QueryResult<AlarmAggregate> {
        let row = query_as::<_, AlarmTotalsRow>(
            r#"SELECT COUNT(*)                                         AS total,
                      COUNT(*) FILTER (WHERE "Al_Priority" <= 2)       AS critical_high,
                      AVG(EXTRACT(EPOCH FROM ("Al_Norm_Time" - "Al_Start_Time")) / 60)::float8
                                                                       AS avg_resolution_minutes
                 FROM "ALARMHISTORY"
                WHERE "Al_Start_Time" >= $1 AND "Al_Start_Time" < $2
                  AND "Al_Norm_Time" IS NOT NULL"#,
        )
        .bind(window.start())
        .bind(window.end())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::Alarms, e))?;

        Ok(AlarmAggregate {
            total: row.total,
            critical_high: row.critical_high,
            avg_resolution_minutes: round_to(row.avg_resolution_minutes.unwrap_or(0.0), 1),
        })
    }

    async fn chemical_breakdown(&self, window: TimeWindow) -> QueryResult<Vec<ChemicalUsage>> {
        let rows = query_as::<_, ChemicalDoseRow>(
            r#"SELECT d.code,
                      SUM(d.amount)::float8 AS quantity,
                      COUNT(*)              AS records,
                      AVG(d.amount)::float8 AS avg_per_record
                 FROM "Rel_Quimico" rq
                 CROSS JOIN LATERAL (VALUES
                      ('Q1', rq."Q1"::float8), ('Q2', rq."Q2"::float8), ('Q3', rq."Q3"::float8),
                      ('Q4', rq."Q4"::float8), ('Q5', rq."Q5"::float8), ('Q6', rq."Q6"::float8),
                      ('Q7', rq."Q7"::float8), ('Q8', rq."Q8"::float8), ('Q9', rq."Q9"::float8)
                 ) AS d(code, amount)
                WHERE rq."Time_Stamp" >= $1 AND rq."Time_Stamp" < $2
                  AND d.amount > 0
                GROUP BY d.code
                ORDER BY quantity DESC"#,
        )
        .bind(window.start())
        .bind(window.end())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::ChemicalBreakdown, e))?;

        Ok(rows
            .into_iter()
            .map(|row| ChemicalUsage {
                label: chemical_label(&row.code),
                code: row.code,
                quantity_kg: row.quantity / GRAMS_PER_KG,
                cycles: row.records,
                avg_per_cycle_kg: row.avg_per_record / GRAMS_PER_KG,
            })
            .collect())
    }

    async fn production_by_client(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<Vec<LoadBreakdown>> {
        query_as::<_, LoadBreakdown>(
            r#"SELECT rc."C1"::int8                                          AS id,
                      COALESCE(c.client_name, 'Cliente ' || rc."C1"::text)   AS label,
                      COUNT(*)                                               AS loads,
                      COALESCE(SUM(rc."C2"), 0)::float8                      AS total_weight_kg,
                      COALESCE(AVG(rc."C2"), 0)::float8                      AS avg_weight_per_load
                 FROM "Rel_Carga" rc
                 LEFT JOIN clientes c ON rc."C1"::int8 = c.client_id
                WHERE rc."Time_Stamp" >= $1 AND rc."Time_Stamp" < $2
                  AND ($3::int8 IS NULL OR rc."C1"::int8 = $3)
                GROUP BY c.client_name, rc."C1"
                ORDER BY total_weight_kg DESC
                LIMIT $4"#,
        )
        .bind(window.start())
        .bind(window.end())
        .bind(client_key(client))
        .bind(CLIENT_CHART_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::ProductionByClient, e))
    }

    async fn production_by_program(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<Vec<LoadBreakdown>> {
        query_as::<_, LoadBreakdown>(
            r#"SELECT rc."C0"::int8                                          AS id,
                      COALESCE(p.program_name, 'Programa ' || rc."C0"::text) AS label,
                      COUNT(*)                                               AS loads,
                      COALESCE(SUM(rc."C2"), 0)::float8                      AS total_weight_kg,
                      COALESCE(AVG(rc."C2"), 0)::float8                      AS avg_weight_per_load
                 FROM "Rel_Carga" rc
                 LEFT JOIN programas p ON rc."C0"::int8 = p.program_id
                WHERE rc."Time_Stamp" >= $1 AND rc."Time_Stamp" < $2
                  AND ($3::int8 IS NULL OR rc."C1"::int8 = $3)
                GROUP BY p.program_name, rc."C0"
                ORDER BY total_weight_kg DESC"#,
        )
        .bind(window.start())
        .bind(window.end())
        .bind(client_key(client))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::ProductionByProgram, e))
    }

    async fn top_alarms(
        &self,
        window: TimeWindow,
        limit: i64,
    ) -> QueryResult<Vec<AlarmFrequency>> {
        query_as::<_, AlarmFrequency>(
            r#"SELECT "Al_Tag"::text       AS tag,
                      "Al_Message"::text   AS message,
                      "Al_Selection"::text AS area,
                      COUNT(*)             AS frequency,
                      AVG(EXTRACT(EPOCH FROM ("Al_Norm_Time" - "Al_Start_Time")) / 60)::float8
                                           AS avg_duration_minutes
                 FROM "ALARMHISTORY"
                WHERE "Al_Start_Time" >= $1 AND "Al_Start_Time" < $2
                GROUP BY "Al_Tag", "Al_Message", "Al_Selection"
                ORDER BY frequency DESC
                LIMIT $3"#,
        )
        .bind(window.start())
        .bind(window.end())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::TopAlarms, e))
    }

    async fn active_alarms(&self, now: NaiveDateTime, limit: i64) -> QueryResult<Vec<ActiveAlarm>> {
        let since = now.date().and_time(chrono::NaiveTime::MIN) - Duration::days(ACTIVE_ALARM_TABLE_DAYS);
        let rows = query_as::<_, ActiveAlarmRow>(
            r#"SELECT "Al_Tag"::text       AS tag,
                      "Al_Message"::text   AS message,
                      "Al_Selection"::text AS area,
                      "Al_Priority"::int4  AS priority,
                      "Al_Start_Time"      AS started_at
                 FROM "ALARMHISTORY"
                WHERE "Al_Norm_Time" IS NULL
                  AND "Al_Start_Time" >= $1
                ORDER BY "Al_Priority", "Al_Start_Time" DESC
                LIMIT $2"#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::ActiveAlarms, e))?;

        Ok(rows.into_iter().map(|row| ActiveAlarm::from_row(row, now)).collect())
    }

    async fn efficiency_series(
        &self,
        window: TimeWindow,
        client: Option<ClientId>,
    ) -> QueryResult<Vec<EfficiencyPoint>> {
        let points = query_as::<_, EfficiencyPoint>(
            r#"SELECT "Time_Stamp"                                             AS "timestamp",
                      ("C1"::float8 / ("C1" + "C0")::float8 * 100)::float8    AS efficiency_percent
                 FROM "Rel_Diario"
                WHERE "Time_Stamp" >= $1 AND "Time_Stamp" < $2
                  AND ("C1" + "C0") > 0
                  AND ($3::int8 IS NULL OR "C5" = $3)
                ORDER BY "Time_Stamp""#,
        )
        .bind(window.start())
        .bind(window.end())
        .bind(client_key(client))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QueryError::new(MetricFamily::EfficiencySeries, e))?;

        Ok(points
            .into_iter()
            .map(|p| EfficiencyPoint {
                efficiency_percent: round_to(p.efficiency_percent, 2),
                ..p
            })
            .collect())
    }
}
