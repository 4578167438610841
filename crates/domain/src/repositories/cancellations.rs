use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::cancellations::InsertCancellationEntity;

#[automock]
#[async_trait]
pub trait CancellationRepository {
    async fn insert(&self, insert_cancellation_entity: InsertCancellationEntity) -> Result<Uuid>;
}
