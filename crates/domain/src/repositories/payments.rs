use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::payments::{InsertPaymentEntity, PaymentEntity};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn insert(&self, insert_payment_entity: InsertPaymentEntity) -> Result<Uuid>;

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>>;

    /// The subscription's current charge: the most recent payment by creation
    /// time.
    async fn find_latest_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<PaymentEntity>>;

    async fn set_gateway_tx_ref(&self, payment_id: Uuid, gateway_tx_ref: &str) -> Result<()>;

    /// Guarded pending -> success transition. Returns false when the row was
    /// no longer pending; callers treat that as "someone else already
    /// confirmed this" and apply no side effects. Webhook delivery and
    /// return-URL polling both funnel through this.
    async fn mark_success<'a>(
        &self,
        payment_id: Uuid,
        gateway_tx_ref: Option<&'a str>,
        payment_method: Option<&'a str>,
    ) -> Result<bool>;

    /// Guarded pending -> failed transition, same contract as `mark_success`.
    async fn mark_failed<'a>(&self, payment_id: Uuid, error: Option<&'a str>) -> Result<bool>;
}
