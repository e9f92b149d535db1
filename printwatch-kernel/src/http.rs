//! Dashboard and agent HTTP surface.
//!
//! `/health` is open. Dashboard routes need `x-api-key`, agent routes need
//! `x-agent-token`; an unset secret denies every request on its routes.

use crate::config::Secrets;
use crate::error::ApiError;
use crate::health::KernelHealth;
use crate::reconciler::ReconciledSnapshot;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use printwatch_core::{AgentPush, FleetSnapshot, ManagedDevice, ScanError, TriggerError};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::warn;

pub fn build_router(app_state: AppState) -> Router {
    let dashboard = Router::new()
        .route("/system/health", get(get_system_health))
        .route("/fleet", get(get_fleet))
        .route("/fleet/cloud", get(get_cloud_fleet))
        .route("/fleet/check", post(check_now))
        .route_layer(middleware::from_fn_with_state(app_state.secrets.clone(), require_api_key));

    let agent = Router::new()
        .route("/agent/devices", get(agent_devices))
        .route("/agent/push", post(agent_push))
        .route_layer(middleware::from_fn_with_state(app_state.secrets.clone(), require_agent_token));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(dashboard)
        .merge(agent)
        .with_state(app_state)
}

fn header_matches(req: &Request, header: &str, expected: Option<&str>, var: &str) -> Result<(), StatusCode> {
    let Some(expected) = expected else {
        warn!(var, path = %req.uri().path(), "secret not set, access denied");
        return Err(StatusCode::UNAUTHORIZED);
    };
    let ok = req
        .headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);
    if !ok {
        warn!(header, path = %req.uri().path(), "rejected request with bad credentials");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

async fn require_api_key(State(secrets): State<Arc<Secrets>>, req: Request, next: Next) -> Result<Response, StatusCode> {
    header_matches(&req, "x-api-key", secrets.api_key.as_deref(), "PRINTWATCH_API_KEY")?;
    Ok(next.run(req).await)
}

async fn require_agent_token(
    State(secrets): State<Arc<Secrets>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    header_matches(&req, "x-agent-token", secrets.agent_token.as_deref(), "PRINTWATCH_AGENT_TOKEN")?;
    Ok(next.run(req).await)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(app.scheduler.stats(), app.reconciler.store()))
}

// GET /fleet
async fn get_fleet(State(app): State<AppState>) -> Result<Json<ReconciledSnapshot>, ApiError> {
    Ok(Json(app.reconciler.read().await?))
}

// GET /fleet/cloud
async fn get_cloud_fleet(State(app): State<AppState>) -> Result<Json<FleetSnapshot>, ApiError> {
    app.last_cloud
        .lock()
        .clone()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no cloud-side scan has completed yet".into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReply {
    ok: bool,
    msg: String,
    total: usize,
    with_issues: usize,
}

// POST /fleet/check
async fn check_now(State(app): State<AppState>) -> Result<Json<CheckReply>, ApiError> {
    match app.scheduler.run_now().await {
        Ok(snapshot) => Ok(Json(CheckReply {
            ok: true,
            msg: format!("checked {} printers, {} with issues", snapshot.total, snapshot.with_issues),
            total: snapshot.total,
            with_issues: snapshot.with_issues,
        })),
        Err(TriggerError::Busy) => Err(ApiError::ScanInProgress),
        Err(TriggerError::Failed(e)) => Err(match e.downcast::<ScanError>() {
            Ok(scan) => scan.into(),
            Err(other) => ApiError::Internal(format!("{other:#}")),
        }),
    }
}

// GET /agent/devices
async fn agent_devices(State(app): State<AppState>) -> Result<Json<Vec<ManagedDevice>>, ApiError> {
    Ok(Json(app.inventory.devices().await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushReply {
    ok: bool,
    push_id: String,
    #[serde(with = "time::serde::rfc3339")]
    received_at: OffsetDateTime,
}

// POST /agent/push
async fn agent_push(State(app): State<AppState>, Json(push): Json<AgentPush>) -> Json<PushReply> {
    let stored = app.reconciler.store().accept(push);
    Json(PushReply {
        ok: true,
        push_id: stored.push_id.to_string(),
        received_at: stored.received_at,
    })
}
