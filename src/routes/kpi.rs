// backend/src/routes/kpi.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tracing::warn;

use super::{today, WindowQuery};
use crate::auth::AuthUser;
use crate::kpi::KpiSet;
use crate::AppState;

/// GET /api/v1/kpis
pub async fn get_kpis(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<WindowQuery>,
) -> Result<Json<KpiSet>, (StatusCode, String)> {
    let (start, end) = q.dates(today())?;
    let set = state.kpis.compute_kpis(start, end, q.client()).await;
    if !set.is_complete() {
        warn!(%start, %end, unavailable = set.unavailable.len(), "serving partial KPI set");
    }
    Ok(Json(set))
}
