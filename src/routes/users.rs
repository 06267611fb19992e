// backend/src/routes/users.rs

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::auth::store::{create_user as store_user, UserSummary};
use crate::auth::{require_admin, AuthUser, Role};
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateUserBody {
    pub username: String,
    pub password: String,
    pub role: Option<String>,
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(b): Json<CreateUserBody>,
) -> AppResult<(StatusCode, Json<UserSummary>)> {
    require_admin(&user)?;
    let role = match b.role.as_deref() {
        Some(raw) => raw.parse::<Role>().map_err(AppError::bad_request)?,
        None => Role::Operator,
    };

    let created = store_user(state.credentials.as_ref(), &b.username, &b.password, role).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Vec<UserSummary>>> {
    require_admin(&user)?;
    Ok(Json(state.credentials.list().await?))
}
