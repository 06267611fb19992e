// backend/src/routes/reports.rs

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{bad_request, internal_error, today, WindowQuery};
use crate::auth::AuthUser;
use crate::report::export::{export, ExportFormat};
use crate::report::Report;
use crate::AppState;

#[derive(Deserialize)]
pub struct ExportQ {
    pub format: Option<String>,
}

/// GET /api/v1/reports/executive
pub async fn executive_report(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<WindowQuery>,
) -> Result<Json<Report>, (StatusCode, String)> {
    let (start, end) = q.dates(today())?;
    Ok(Json(state.reports.build_report(start, end).await))
}

/// GET /api/v1/reports/executive/export?format=txt|xlsx|html
pub async fn export_executive_report(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<WindowQuery>,
    Query(f): Query<ExportQ>,
) -> Result<([(header::HeaderName, String); 2], Vec<u8>), (StatusCode, String)> {
    let format = f
        .format
        .as_deref()
        .unwrap_or("txt")
        .parse::<ExportFormat>()
        .map_err(bad_request)?;
    let (start, end) = q.dates(today())?;

    let report = state.reports.build_report(start, end).await;
    let exported = export(&report, format).map_err(internal_error)?;
    info!(
        username = %user.session.username,
        filename = %exported.filename,
        failed = report.is_error(),
        "report exported"
    );

    Ok((
        [
            (header::CONTENT_TYPE, exported.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", exported.filename),
            ),
        ],
        exported.bytes,
    ))
}
