use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use application::usecases::subscription_lifecycle::DowngradeOutcome;
use infra::postgres::postgres_connection::PgPoolSquad;

use crate::auth::AuthUser;
use crate::axum_http::error_responses;
use crate::config::config_model::DotEnvyConfig;

use super::{LifecycleService, build_lifecycle};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let lifecycle = build_lifecycle(&db_pool, &config);

    Router::new()
        .route("/plans", get(list_plans))
        .route("/offer", get(purchase_offer))
        .route("/current", get(current_subscription))
        .route("/subscribe", post(subscribe))
        .route("/cancel", post(cancel_subscription))
        .route("/upgrade", post(request_upgrade))
        .route("/downgrade", post(schedule_downgrade))
        .route("/downgrade/cancel", post(cancel_downgrade))
        .with_state(lifecycle)
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plan: String,
    pub duration: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub subscription_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub subscription_id: Uuid,
    pub target_plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DowngradeRequest {
    pub subscription_id: Uuid,
    pub target_plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CancelDowngradeRequest {
    pub request_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub access_until: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DowngradeResponse {
    Scheduled {
        request_id: Uuid,
        scheduled_for: chrono::DateTime<chrono::Utc>,
    },
    AppliedImmediately,
}

pub async fn list_plans(
    State(lifecycle): State<Arc<LifecycleService>>,
    _auth: AuthUser,
) -> impl IntoResponse {
    match lifecycle.list_plans().await {
        Ok(plans) => (StatusCode::OK, Json(plans)).into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}

pub async fn purchase_offer(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
) -> impl IntoResponse {
    match lifecycle.purchase_offer(auth.user_id).await {
        Ok(offer) => (StatusCode::OK, Json(offer)).into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}

pub async fn current_subscription(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
) -> impl IntoResponse {
    match lifecycle.current_subscription(auth.user_id).await {
        Ok(current) => (StatusCode::OK, Json(current)).into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}

pub async fn subscribe(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
    Json(body): Json<SubscribeRequest>,
) -> impl IntoResponse {
    match lifecycle
        .create_subscription(&auth.actor(), &auth.contact(), &body.plan, &body.duration)
        .await
    {
        Ok(checkout) => (StatusCode::OK, Json(checkout)).into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}

pub async fn cancel_subscription(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
    Json(body): Json<CancelRequest>,
) -> impl IntoResponse {
    let reason = body
        .reason
        .unwrap_or_else(|| "User requested cancellation".to_string());

    match lifecycle
        .cancel_at_period_end(&auth.actor(), body.subscription_id, &reason)
        .await
    {
        Ok(access_until) => (StatusCode::OK, Json(CancelResponse { access_until })).into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}

pub async fn request_upgrade(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
    Json(body): Json<UpgradeRequest>,
) -> impl IntoResponse {
    match lifecycle
        .request_upgrade(
            &auth.actor(),
            &auth.contact(),
            body.subscription_id,
            body.target_plan_id,
        )
        .await
    {
        Ok(checkout) => (StatusCode::OK, Json(checkout)).into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}

pub async fn schedule_downgrade(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
    Json(body): Json<DowngradeRequest>,
) -> impl IntoResponse {
    match lifecycle
        .schedule_downgrade(&auth.actor(), body.subscription_id, body.target_plan_id)
        .await
    {
        Ok(DowngradeOutcome::Scheduled {
            request_id,
            scheduled_for,
        }) => (
            StatusCode::OK,
            Json(DowngradeResponse::Scheduled {
                request_id,
                scheduled_for,
            }),
        )
            .into_response(),
        Ok(DowngradeOutcome::AppliedImmediately) => {
            (StatusCode::OK, Json(DowngradeResponse::AppliedImmediately)).into_response()
        }
        Err(err) => error_responses::lifecycle_error(err),
    }
}

pub async fn cancel_downgrade(
    State(lifecycle): State<Arc<LifecycleService>>,
    auth: AuthUser,
    Json(body): Json<CancelDowngradeRequest>,
) -> impl IntoResponse {
    match lifecycle
        .cancel_downgrade(&auth.actor(), body.request_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}
