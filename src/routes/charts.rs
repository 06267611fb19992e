// backend/src/routes/charts.rs
//
// Series behind the dashboard charts and the active alarm table.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Local;
use serde::Deserialize;

use super::{store_error, today, WindowQuery};
use crate::auth::AuthUser;
use crate::models::{ActiveAlarm, AlarmFrequency, EfficiencyPoint, LoadBreakdown};
use crate::AppState;

#[derive(Deserialize)]
pub struct LimitQ {
    pub limit: Option<i64>,
}

/// GET /api/v1/charts/efficiency
pub async fn efficiency(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<WindowQuery>,
) -> Result<Json<Vec<EfficiencyPoint>>, (StatusCode, String)> {
    let window = q.window(today())?;
    let points = state
        .metrics
        .efficiency_series(window, q.client())
        .await
        .map_err(store_error)?;
    Ok(Json(points))
}

/// GET /api/v1/charts/production-by-client
pub async fn production_by_client(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<WindowQuery>,
) -> Result<Json<Vec<LoadBreakdown>>, (StatusCode, String)> {
    let window = q.window(today())?;
    let rows = state
        .metrics
        .production_by_client(window, q.client())
        .await
        .map_err(store_error)?;
    Ok(Json(rows))
}

/// GET /api/v1/charts/production-by-program
pub async fn production_by_program(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<WindowQuery>,
) -> Result<Json<Vec<LoadBreakdown>>, (StatusCode, String)> {
    let window = q.window(today())?;
    let rows = state
        .metrics
        .production_by_program(window, q.client())
        .await
        .map_err(store_error)?;
    Ok(Json(rows))
}

/// GET /api/v1/charts/top-alarms
pub async fn top_alarms(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<WindowQuery>,
    Query(l): Query<LimitQ>,
) -> Result<Json<Vec<AlarmFrequency>>, (StatusCode, String)> {
    let window = q.window(today())?;
    let limit = l.limit.unwrap_or(10).clamp(1, 50);
    let rows = state
        .metrics
        .top_alarms(window, limit)
        .await
        .map_err(store_error)?;
    Ok(Json(rows))
}

/// GET /api/v1/alarms/active
pub async fn active_alarms(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(l): Query<LimitQ>,
) -> Result<Json<Vec<ActiveAlarm>>, (StatusCode, String)> {
    let limit = l.limit.unwrap_or(20).clamp(1, 100);
    let rows = state
        .metrics
        .active_alarms(Local::now().naive_local(), limit)
        .await
        .map_err(store_error)?;
    Ok(Json(rows))
}
