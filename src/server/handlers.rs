//! Route handlers. Each one authenticates, runs a single pipeline step and
//! renders its summary as JSON.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::accounts::linker::link_account;
use crate::auth::Principal;
use crate::automation::{enforcer, queue};
use crate::insights::recommend::{self, Mode};

type ApiResult = Result<Json<Value>, ApiError>;

/// Parse an optional JSON body; an empty body reads as `{}`.
fn json_body(body: &Bytes) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body)
}

/// Fallback for unmatched routes, and for wrong methods on the automation routes.
pub(crate) async fn handle_not_found() -> ApiError {
    ApiError::NotFound
}

pub(crate) async fn handle_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })),
    )
}

/// POST /automation-enforce/run
pub(crate) async fn handle_enforce(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> ApiResult {
    let summary = enforcer::enforce(state.store.as_ref(), &principal).await?;
    let message = if summary.rules_evaluated == 0 {
        "No enabled automation rules".to_string()
    } else {
        format!(
            "Processed {} rule(s), queued {} operation(s)",
            summary.rules_evaluated, summary.queued_total
        )
    };
    Ok(Json(json!({
        "message": message,
        "rules": summary.rules_evaluated,
        "queued": summary.queued_total,
        "runs": summary.runs,
    })))
}

/// POST /process-queue/run with optional `{"max": n}`.
pub(crate) async fn handle_drain(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    body: Bytes,
) -> ApiResult {
    // an unreadable body falls back to the default batch size
    let requested = json_body(&body)
        .ok()
        .and_then(|v| v.get("max").and_then(Value::as_i64));
    let max = queue::batch_size(requested, state.queue_default_max);

    let summary = queue::drain(state.store.as_ref(), &principal, max).await?;
    Ok(Json(json!({
        "message": format!(
            "Processed {} operation(s) and {} recommendation action(s)",
            summary.operations_processed, summary.recommendation_actions_processed
        ),
        "operations": summary.operations_processed,
        "recommendation_actions": summary.recommendation_actions_processed,
    })))
}

/// POST /generate-recommendations/run with optional `{"modes": [...]}`.
pub(crate) async fn handle_generate(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    body: Bytes,
) -> ApiResult {
    let body = json_body(&body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {}", e)))?;
    let requested: Option<Vec<String>> = body.get("modes").and_then(Value::as_array).map(|arr| {
        arr.iter()
            .filter_map(|m| m.as_str().map(str::to_string))
            .collect()
    });
    let modes = Mode::resolve(requested.as_deref());
    let today = chrono::Utc::now().date_naive();

    let summary = recommend::generate(state.store.as_ref(), &principal, &modes, today).await?;
    Ok(Json(json!({
        "message": summary.to_string(),
        "inserted": summary.inserted,
        "modes": summary.modes,
    })))
}

/// POST /link-account
pub(crate) async fn handle_link(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    body: Bytes,
) -> ApiResult {
    let body: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {}", e)))?;
    let account = link_account(state.store.as_ref(), &principal, &body).await?;
    Ok(Json(json!({
        "message": format!("{} account linked", account.provider),
        "account": {
            "id": account.id,
            "provider": account.provider,
            "name": account.name,
            "account_id": account.account_id,
            "status": account.status,
            "metadata": account.metadata,
        },
    })))
}
