//! Informational and diagnostic endpoints. None of these touch a photo.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use tcr_core::utils::{iso_timestamp_utc, RequestLogEntry};

use crate::{errors::ApiError, router::AppState};

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "Server is running! 🚀",
        "message": "Telegram Camera Web App Server",
        "endpoints": {
            "GET /": "Server information",
            "GET /health": "Liveness and log sink health",
            "GET /bot-info": "Bot information",
            "GET /api/bot-status": "Bot information",
            "GET /api/stats": "Request counters",
            "GET /api/test": "API smoke test",
            "POST /api/send-photo": "Send a photo"
        },
        "timestamp": iso_timestamp_utc(),
    }))
}

/// `GET /bot-info` and `GET /api/bot-status`
pub async fn bot_info(State(state): State<AppState>) -> Response {
    match state.relay.bot_identity().await {
        Ok(bot) => {
            state.request_log.record(RequestLogEntry::bot_info(200, None));
            let bot_url = bot.url();
            Json(json!({
                "success": true,
                "bot": bot,
                "bot_url": bot_url,
            }))
            .into_response()
        }
        Err(e) => {
            let details = e.to_string();
            tracing::warn!(error = %details, "bot identity check failed");
            let err = ApiError::BotInfo { details };
            state.request_log.record(RequestLogEntry::bot_info(
                err.status_code().as_u16(),
                Some(&err.to_string()),
            ));
            err.into_response()
        }
    }
}

/// `GET /health`. Always 200 while the process serves; a failing log sink
/// shows up as `degraded`.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let log_sink = state.request_log.health();
    let status = if log_sink.healthy { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "uptime_secs": state.stats.uptime_secs(),
        "log_sink": log_sink,
        "timestamp": iso_timestamp_utc(),
    }))
}

/// `GET /api/stats`
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    let s = state.stats.snapshot();
    Json(json!({
        "success": true,
        "requests": s.requests,
        "delivered": s.delivered,
        "rejected": s.rejected,
        "failed": s.failed,
        "uptime_secs": s.uptime_secs,
    }))
}

/// `GET /api/test`
pub async fn api_test() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "API is working",
        "timestamp": iso_timestamp_utc(),
    }))
}
