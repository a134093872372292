//! HTTP surface: `POST /api/lead` for the landing-page form and `GET /health`.

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::error::LeadError;
use crate::intake::LeadIntake;

const UNKNOWN_CLIENT: &str = "unknown";

/// A lead is a handful of short form fields.
const BODY_LIMIT: usize = 64 * 1024;

// ── Shared state ───────────────────────────────────────────────────────────────

pub struct AppState {
    pub intake: LeadIntake,
    pub client_ip_header: String,
}

// ── Response types ─────────────────────────────────────────────────────────────

/// `{ok, error?}` body returned for every lead submission.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LeadResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LeadResponse {
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

// ── Handlers ───────────────────────────────────────────────────────────────────

/// First entry of the proxy header, or "unknown" if the header is absent or blank.
fn client_key(headers: &HeaderMap, header_name: &str) -> String {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "lead-relay"
    }))
}

async fn submit_lead(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let client = client_key(&headers, &state.client_ip_header);
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Unreadable lead body from {}: {}", client, rejection.body_text());
            return LeadError::Unexpected(rejection.body_text()).into_response();
        }
    };
    match state.intake.handle(&client, &body).await {
        Ok(_) => (StatusCode::OK, Json(LeadResponse::success())).into_response(),
        Err(e) => e.into_response(),
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        String::new()
    };
    error!("Lead handler panicked: {}", detail);
    LeadError::Unexpected(detail).into_response()
}

// ── Router ─────────────────────────────────────────────────────────────────────

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/lead", post(submit_lead))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(Arc::new(state))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
