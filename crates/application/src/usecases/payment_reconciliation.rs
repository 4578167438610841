use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use domain::{
    repositories::{
        cancellations::CancellationRepository, downgrade_requests::DowngradeRequestRepository,
        payments::PaymentRepository, plans::PlanRepository,
        subscription_logs::SubscriptionLogRepository, subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus, iam::Actor,
        payment_reference::PaymentReference,
    },
};

use crate::gateway::{ChapaGateway, GatewayTransactionStatus};
use crate::usecases::subscription_lifecycle::{LifecycleError, LifecycleResult, SubscriptionLifecycleUseCase};

/// Webhook processing only ever fails outward on a bad signature; everything
/// else is accept-and-drop so the gateway sees a 200 and stops retrying, and
/// endpoint probes learn nothing about internal state.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature")]
    InvalidSignature,
}

/// What happened to a delivery, for logging and tests. Dropped deliveries are
/// still acknowledged to the gateway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WebhookDisposition {
    Processed,
    Dropped(&'static str),
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    tx_ref: String,
    status: Option<String>,
    data: Option<WebhookTransactionData>,
}

#[derive(Debug, Deserialize, Default)]
struct WebhookTransactionData {
    reference: Option<String>,
    payment_method: Option<String>,
}

pub struct PaymentReconciliationUseCase<P, S, Pay, D, C, L, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    D: DowngradeRequestRepository + Send + Sync + 'static,
    C: CancellationRepository + Send + Sync + 'static,
    L: SubscriptionLogRepository + Send + Sync + 'static,
    G: ChapaGateway + Send + Sync + 'static,
{
    lifecycle: Arc<SubscriptionLifecycleUseCase<P, S, Pay, D, C, L, G>>,
    subscription_repo: Arc<S>,
    payment_repo: Arc<Pay>,
    gateway: Arc<G>,
}

impl<P, S, Pay, D, C, L, G> PaymentReconciliationUseCase<P, S, Pay, D, C, L, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    D: DowngradeRequestRepository + Send + Sync + 'static,
    C: CancellationRepository + Send + Sync + 'static,
    L: SubscriptionLogRepository + Send + Sync + 'static,
    G: ChapaGateway + Send + Sync + 'static,
{
    pub fn new(
        lifecycle: Arc<SubscriptionLifecycleUseCase<P, S, Pay, D, C, L, G>>,
        subscription_repo: Arc<S>,
        payment_repo: Arc<Pay>,
        gateway: Arc<G>,
    ) -> Self {
        Self {
            lifecycle,
            subscription_repo,
            payment_repo,
            gateway,
        }
    }

    /// Processes one asynchronous gateway delivery. The raw body is verified
    /// against the shared secret when a signature header is present, then the
    /// embedded transaction reference is decoded and the matching payment is
    /// driven through the lifecycle engine.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> std::result::Result<WebhookDisposition, WebhookError> {
        match signature {
            Some(signature) => {
                self.gateway
                    .verify_webhook_signature(payload, signature)
                    .map_err(|err| {
                        warn!(error = %err, "payment_webhook: signature verification failed");
                        WebhookError::InvalidSignature
                    })?;
            }
            None => {
                warn!("payment_webhook: delivery without a signature header");
            }
        }

        let parsed: WebhookPayload = match serde_json::from_slice(payload) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "payment_webhook: unparseable payload; dropping");
                return Ok(WebhookDisposition::Dropped("unparseable payload"));
            }
        };

        let Some(reference) = PaymentReference::decode(&parsed.tx_ref) else {
            warn!(
                tx_ref = %parsed.tx_ref,
                "payment_webhook: unroutable transaction reference; dropping"
            );
            return Ok(WebhookDisposition::Dropped("unroutable reference"));
        };

        let subscription = match self
            .subscription_repo
            .find_by_id(reference.subscription_id)
            .await
        {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                warn!(
                    subscription_id = %reference.subscription_id,
                    "payment_webhook: unknown subscription; dropping"
                );
                return Ok(WebhookDisposition::Dropped("unknown subscription"));
            }
            Err(err) => {
                error!(db_error = ?err, "payment_webhook: subscription lookup failed; dropping");
                return Ok(WebhookDisposition::Dropped("lookup failed"));
            }
        };

        let payment = match self
            .payment_repo
            .find_latest_for_subscription(subscription.id)
            .await
        {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                warn!(
                    subscription_id = %subscription.id,
                    "payment_webhook: subscription has no payment; dropping"
                );
                return Ok(WebhookDisposition::Dropped("no payment"));
            }
            Err(err) => {
                error!(db_error = ?err, "payment_webhook: payment lookup failed; dropping");
                return Ok(WebhookDisposition::Dropped("lookup failed"));
            }
        };

        let succeeded = match parsed.status.as_deref() {
            Some("success") => true,
            Some("failed") => false,
            other => {
                debug!(status = ?other, "payment_webhook: unhandled status; dropping");
                return Ok(WebhookDisposition::Dropped("unhandled status"));
            }
        };

        let gateway_ref = parsed
            .data
            .as_ref()
            .and_then(|data| data.reference.clone())
            .unwrap_or_else(|| parsed.tx_ref.clone());
        let payment_method = parsed.data.as_ref().and_then(|data| data.payment_method.clone());

        match self
            .lifecycle
            .confirm_payment(
                payment.id,
                None,
                succeeded,
                Some(&gateway_ref),
                payment_method.as_deref(),
            )
            .await
        {
            Ok(outcome) => {
                info!(
                    payment_id = %payment.id,
                    subscription_id = %subscription.id,
                    outcome = ?outcome,
                    "payment_webhook: delivery processed"
                );
                Ok(WebhookDisposition::Processed)
            }
            Err(err) => {
                error!(
                    payment_id = %payment.id,
                    error = ?err,
                    "payment_webhook: confirmation failed; acknowledging anyway"
                );
                Ok(WebhookDisposition::Dropped("confirmation failed"))
            }
        }
    }

    /// Return-URL fallback for delayed or lost webhooks: while the
    /// subscription is still pending, ask the gateway for the transaction
    /// status and apply the same transition the webhook would have. Safe to
    /// call redundantly and concurrently with webhook delivery; both paths
    /// share the payment-status guard.
    pub async fn poll_verify(
        &self,
        subscription_id: Uuid,
        actor: &Actor,
    ) -> LifecycleResult<SubscriptionStatus> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        if !actor.owns(subscription.user_id) {
            return Err(LifecycleError::OwnershipMismatch);
        }

        let status = SubscriptionStatus::from_str(&subscription.status);
        if status != SubscriptionStatus::Pending {
            return Ok(status);
        }

        let payment = self
            .payment_repo
            .find_latest_for_subscription(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        let Some(tx_ref) = payment.gateway_tx_ref.clone() else {
            info!(
                %subscription_id,
                "poll_verify: payment has no gateway reference yet"
            );
            return Ok(SubscriptionStatus::Pending);
        };

        let verified = self
            .gateway
            .verify_transaction(&tx_ref)
            .await
            .map_err(|err| {
                error!(%subscription_id, error = ?err, "poll_verify: gateway verification failed");
                LifecycleError::Gateway(err.to_string())
            })?;

        match verified.status {
            GatewayTransactionStatus::Success => {
                self.lifecycle
                    .confirm_payment(
                        payment.id,
                        None,
                        true,
                        Some(&verified.reference),
                        verified.payment_method.as_deref(),
                    )
                    .await?;
                Ok(SubscriptionStatus::Active)
            }
            GatewayTransactionStatus::Failed => {
                self.lifecycle
                    .confirm_payment(payment.id, None, false, Some(&verified.reference), None)
                    .await?;
                Ok(SubscriptionStatus::Cancelled)
            }
            GatewayTransactionStatus::Pending => Ok(SubscriptionStatus::Pending),
        }
    }
}
