use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use application::usecases::payment_reconciliation::WebhookError;
use infra::postgres::postgres_connection::PgPoolSquad;

use crate::auth::AuthUser;
use crate::axum_http::error_responses;
use crate::config::config_model::DotEnvyConfig;

use super::{ReconciliationService, build_reconciliation};

const SIGNATURE_HEADER: &str = "x-chapa-signature";

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let reconciliation = build_reconciliation(&db_pool, &config);

    Router::new()
        .route("/webhook", post(gateway_webhook))
        .route("/verify", get(poll_verify))
        .with_state(reconciliation)
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub subscription_id: Uuid,
}

/// Gateway deliveries are acknowledged with 200 no matter what happened
/// internally; only a bad signature earns a 400.
pub async fn gateway_webhook(
    State(reconciliation): State<Arc<ReconciliationService>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match reconciliation.handle_webhook(&body, signature).await {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(WebhookError::InvalidSignature) => {
            (StatusCode::BAD_REQUEST, "Invalid signature").into_response()
        }
    }
}

/// Return-URL landing endpoint: the browser polls this while the gateway's
/// webhook may still be in flight.
pub async fn poll_verify(
    State(reconciliation): State<Arc<ReconciliationService>>,
    auth: AuthUser,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    match reconciliation
        .poll_verify(params.subscription_id, &auth.actor())
        .await
    {
        Ok(status) => (StatusCode::OK, Json(json!({ "status": status.to_string() }))).into_response(),
        Err(err) => error_responses::lifecycle_error(err),
    }
}
