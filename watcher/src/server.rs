use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::control::{ControlHandle, SettingsPatch};
use crate::presenter::Report;

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub control: ControlHandle,
    pub reports: watch::Receiver<Report>,
}

#[derive(Debug, Serialize)]
struct ControlState {
    active: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /status: latest report from the watch loop
async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.reports.borrow().clone())
}

/// POST /control/start
async fn start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.control.start();
    Json(ControlState {
        active: state.control.is_active(),
    })
}

/// POST /control/pause
async fn pause(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.control.pause();
    Json(ControlState {
        active: state.control.is_active(),
    })
}

/// GET /settings
async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.control.settings())
}

/// PATCH /settings: partial update, applied from the next cycle on
/// Body: { "my_color": "b", "depth": 18, "cooldown_secs": 1.0 }
async fn patch_settings(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SettingsPatch>, JsonRejection>,
) -> impl IntoResponse {
    let Json(patch) = match body {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "rejected settings body");
            return (StatusCode::BAD_REQUEST, e.body_text()).into_response();
        }
    };
    match state.control.update_settings(&patch) {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/control/start", post(start))
        .route("/control/pause", post(pause))
        .route("/settings", get(get_settings).patch(patch_settings))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `0.0.0.0:port` and serve until the task is dropped.
pub async fn serve(port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "status server listening");
    axum::serve(listener, router(state)).await
}
