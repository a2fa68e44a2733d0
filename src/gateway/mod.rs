//! HTTP gateway for front-ends that are not Telegram.
//!
//! `POST /api/chat` runs a full turn synchronously and returns the reply,
//! `POST /api/clear` drops a user's session, `GET /health` reports liveness.
//! Policy refusals are 200s with refusal text; only core failures are 5xx.

use crate::agent::{AgentCore, ChatTurnRequest};
use crate::config::GatewayConfig;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    core: Arc<AgentCore>,
}

#[derive(Debug, Deserialize)]
struct ClearRequest {
    user_id: i64,
}

pub fn router(core: Arc<AgentCore>, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/chat", post(handle_chat))
        .route("/api/clear", post(handle_clear))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .with_state(AppState { core })
}

/// Bind and serve until the process stops.
pub async fn serve(core: Arc<AgentCore>, config: &GatewayConfig) -> anyhow::Result<()> {
    let app = router(Arc::clone(&core), config);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "detail": state.core.status_summary(),
    }))
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatTurnRequest>,
) -> impl IntoResponse {
    match state.core.handle_chat(&request).await {
        Ok(response) => Json(serde_json::json!({ "response": response })).into_response(),
        Err(e) => {
            error!(user_id = request.user_id, "chat turn failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

async fn handle_clear(
    State(state): State<AppState>,
    Json(request): Json<ClearRequest>,
) -> impl IntoResponse {
    let (had_history, dropped) = state.core.clear_session(request.user_id);
    Json(serde_json::json!({
        "success": true,
        "had_history": had_history,
        "dropped_approvals": dropped,
    }))
}
