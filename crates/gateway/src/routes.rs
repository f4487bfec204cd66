use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use classifier::{PredictRequest, RankedResult};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(address: &str, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("HTTP server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Inference is CPU bound, so it runs on the blocking pool under a deadline.
///
/// A blocking task cannot be cancelled. Past the deadline the client gets its
/// 504 at once while the forward pass keeps its pool thread until it ends and
/// its result is discarded. `request_timeout` therefore bounds latency, not
/// CPU use; the blocking pool size bounds how many such passes can pile up.
async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<RankedResult>, ApiError> {
    let Json(request) = payload?;

    let service = state.service.clone();
    let task = tokio::task::spawn_blocking(move || service.predict(&request));

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => Ok(Json(result?)),
        Ok(Err(join_error)) => Err(ApiError::Worker(join_error.to_string())),
        // Dropping the JoinHandle detaches the task; it is not aborted.
        Err(_) => {
            tracing::warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "Classification exceeded deadline"
            );
            Err(ApiError::Timeout)
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "classes": state.service.registry().len(),
    }))
}
