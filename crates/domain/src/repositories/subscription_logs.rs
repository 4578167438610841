use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::subscription_logs::InsertSubscriptionLogEntity;

#[automock]
#[async_trait]
pub trait SubscriptionLogRepository {
    async fn insert(&self, insert_log_entity: InsertSubscriptionLogEntity) -> Result<Uuid>;
}
