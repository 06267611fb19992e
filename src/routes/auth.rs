// backend/src/routes/auth.rs

use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, warn};

use crate::auth::store::authenticate;
use crate::auth::{AuthError, AuthUser};
use crate::error::AppResult;
use crate::models::{LoginBody, LoginResp};
use crate::AppState;

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(b): Json<LoginBody>,
) -> AppResult<Json<LoginResp>> {
    let username = b.username.trim().to_string();
    let role = match authenticate(state.credentials.as_ref(), &username, &b.password).await {
        Ok(role) => role,
        Err(err) => {
            if matches!(err, AuthError::InvalidCredentials) {
                warn!(%username, "login rejected");
            }
            return Err(err.into());
        }
    };

    let token = state.sessions.issue(&username, role).await;
    info!(%username, ?role, "login");
    Ok(Json(LoginResp {
        token,
        username,
        role,
    }))
}

/// POST /api/v1/auth/logout
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> StatusCode {
    state.sessions.revoke(&user.token).await;
    info!(username = %user.session.username, "logout");
    StatusCode::NO_CONTENT
}
