use crate::models::SignalState;
use crate::scheduler::RunControl;
use crate::state_store::StateStore;
use anyhow::Result;
use axum::{Router, extract::State, response::Json, routing::get};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

// -----------------------------------------------
// API RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: &'static str,
    pub changed: bool,
}

// -----------------------------------------------
// APPLICATION STATE
// -----------------------------------------------

#[derive(Clone)]
pub struct AppState {
    store: Arc<StateStore>,
    control: RunControl,
}

impl AppState {
    pub fn new(store: Arc<StateStore>, control: RunControl) -> Self {
        Self { store, control }
    }
}

// -----------------------------------------------
// API HANDLERS
// -----------------------------------------------

/// GET /health - Health check endpoint
async fn health() -> &'static str {
    "OK"
}

/// GET /status - Latest published signal, verbatim
async fn get_status(State(app_state): State<AppState>) -> Json<SignalState> {
    Json(app_state.store.current())
}

/// GET /start - Let the worker run cycles
async fn start(State(app_state): State<AppState>) -> Json<ControlResponse> {
    let changed = app_state.control.start();
    Json(ControlResponse {
        status: "started",
        changed,
    })
}

/// GET /stop - Park the worker
async fn stop(State(app_state): State<AppState>) -> Json<ControlResponse> {
    let changed = app_state.control.stop();
    Json(ControlResponse {
        status: "stopped",
        changed,
    })
}

// -----------------------------------------------
// SERVER SETUP
// -----------------------------------------------

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(get_status))
        .route("/start", get(start))
        .route("/stop", get(stop))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub async fn start_server(
    port: u16,
    app_state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "Signal API server listening");
    info!("Available endpoints: GET /status, GET /start, GET /stop, GET /health");

    axum::serve(listener, router(app_state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
