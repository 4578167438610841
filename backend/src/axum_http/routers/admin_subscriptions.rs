use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;
use uuid::Uuid;

use infra::postgres::postgres_connection::PgPoolSquad;

use crate::auth::AuthUser;
use crate::axum_http::error_responses;
use crate::config::config_model::DotEnvyConfig;

use super::{LifecycleService, build_lifecycle};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let lifecycle = build_lifecycle(&db_pool, &config);

    Router::new()
        .route("/:id/activate", post(activate))
        .route("/:id/change-plan", post(change_plan))
        .route("/:id/cancel", post(cancel_immediate))
        .with_state(lifecycle)
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub new_plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CancelImmediateRequest {
    pub reason: Option<String>,
}

fn forbidden() -> axum::response::Response {
    (StatusCode::FORBIDDEN, "Admin role required").into_response()
}

pub async fn activate(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
    Path(subscription_id): Path<Uuid>,
) -> impl IntoResponse {
    if !auth.is_admin() {
        return forbidden();
    }

    match lifecycle.admin_activate(subscription_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}

pub async fn change_plan(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
    Path(subscription_id): Path<Uuid>,
    Json(body): Json<ChangePlanRequest>,
) -> impl IntoResponse {
    if !auth.is_admin() {
        return forbidden();
    }

    match lifecycle
        .admin_change_plan(subscription_id, body.new_plan_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}

pub async fn cancel_immediate(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
    Path(subscription_id): Path<Uuid>,
    Json(body): Json<CancelImmediateRequest>,
) -> impl IntoResponse {
    if !auth.is_admin() {
        return forbidden();
    }

    let reason = body
        .reason
        .unwrap_or_else(|| "Admin cancelled subscription".to_string());

    match lifecycle
        .cancel_immediate(&auth.actor(), subscription_id, &reason)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}
