//! HTTP routing, shared state and server lifecycle.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::attendance::AttendanceService;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::notify::NotificationDispatcher;
use crate::roster::{import_roster, RosterFile};
use crate::store::{self, SharedStore};
use crate::sweeper::{PastDueSweeper, SweepScheduler};
use crate::task::TaskService;

use super::attendance as attendance_api;
use super::auth;
use super::notifications as notifications_api;
use super::tasks as tasks_api;
use super::types::HealthResponse;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: SharedStore,
    pub clock: Arc<dyn Clock>,
    pub tasks: TaskService,
    pub attendance: AttendanceService,
    pub sweeper: Arc<PastDueSweeper>,
}

impl AppState {
    /// Wire the services around one store and clock.
    pub fn new(config: Config, store: SharedStore, clock: Arc<dyn Clock>) -> Self {
        let dispatcher = NotificationDispatcher::new(store.clone());
        let tasks = TaskService::new(store.clone(), dispatcher.clone(), clock.clone());
        let attendance = AttendanceService::new(
            store.clone(),
            clock.clone(),
            config.weekly_off,
            config.report_cutoff_hour,
        );
        let sweeper = Arc::new(PastDueSweeper::new(store.clone(), dispatcher));
        Self {
            config,
            store,
            clock,
            tasks,
            attendance,
            sweeper,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/api/health", get(health));

    let protected_routes = Router::new()
        .nest("/api/tasks", tasks_api::routes())
        .route("/api/reports/:date", put(attendance_api::save_report))
        .route(
            "/api/reports/:employee_id/:date",
            get(attendance_api::get_report),
        )
        .route(
            "/api/attendance/:employee_id/:year/:month",
            get(attendance_api::month_attendance),
        )
        .route("/api/leaves", post(attendance_api::record_leave))
        .route("/api/holidays", post(attendance_api::add_holiday))
        .nest("/api/notifications", notifications_api::routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = store::create_store(config.store_type, config.data_dir.clone())
        .await
        .map_err(anyhow::Error::msg)?;
    if !store.is_persistent() {
        tracing::warn!("Using in-memory store; data will be lost on restart");
    }

    if let Some(path) = &config.roster_path {
        let roster = RosterFile::load(path)?;
        let imported = import_roster(&store, &roster)
            .await
            .map_err(anyhow::Error::msg)?;
        tracing::info!("Imported {} roster records from {}", imported, path.display());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = Arc::new(AppState::new(config.clone(), store, clock.clone()));

    let scheduler = config
        .sweep_interval
        .map(|interval| SweepScheduler::start(Arc::clone(&state.sweeper), clock, interval));

    let app = router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(cancel) = scheduler {
        cancel.cancel();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        persistent: state.store.is_persistent(),
    })
}
