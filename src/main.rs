// backend/src/main.rs

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod error;
mod kpi;
mod metrics;
mod models;
mod report;
mod routes;

use auth::{CredentialStore, JsonFileCredentialStore, SessionManager};
use config::AppConfig;
use kpi::KpiService;
use metrics::{MetricStore, PgMetricStore};
use report::ReportService;

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Clone, FromRef)]
pub struct AppState {
    pub metrics: Arc<dyn MetricStore>,
    pub kpis: KpiService,
    pub reports: ReportService,
    pub sessions: Arc<SessionManager>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    pub fn new(
        metrics: Arc<dyn MetricStore>,
        credentials: Arc<dyn CredentialStore>,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            kpis: KpiService::new(metrics.clone()),
            reports: ReportService::new(metrics.clone()),
            metrics,
            sessions: Arc::new(SessionManager::new(session_ttl_hours)),
            credentials,
        }
    }
}

fn app(state: AppState) -> Router {
    // Very permissive CORS for local dev (tighten for prod)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // health
        .route("/health", get(routes::health::health))
        // sessions
        .route("/api/v1/auth/login", post(routes::auth::login))
        .route("/api/v1/auth/logout", post(routes::auth::logout))
        // users
        .route(
            "/api/v1/users",
            post(routes::users::create_user).get(routes::users::list_users),
        )
        // KPIs & reports
        .route("/api/v1/kpis", get(routes::kpi::get_kpis))
        .route(
            "/api/v1/reports/executive",
            get(routes::reports::executive_report),
        )
        .route(
            "/api/v1/reports/executive/export",
            get(routes::reports::export_executive_report),
        )
        // charts
        .route("/api/v1/charts/efficiency", get(routes::charts::efficiency))
        .route(
            "/api/v1/charts/production-by-client",
            get(routes::charts::production_by_client),
        )
        .route(
            "/api/v1/charts/production-by-program",
            get(routes::charts::production_by_program),
        )
        .route("/api/v1/charts/top-alarms", get(routes::charts::top_alarms))
        .route("/api/v1/alarms/active", get(routes::charts::active_alarms))
        // state & middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::connect(&config).await?;
    let metrics: Arc<dyn MetricStore> = Arc::new(PgMetricStore::new(pool));

    let credentials = JsonFileCredentialStore::open(&config.users_file).await?;
    auth::store::ensure_bootstrap_admin(&credentials, config.bootstrap_admin_password.as_deref())
        .await?;

    let state = AppState::new(metrics, Arc::new(credentials), config.session_ttl_hours);

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            sessions.prune_expired().await;
        }
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API listening");

    axum::serve(listener, app(state).into_make_service()).await?;
    Ok(())
}
