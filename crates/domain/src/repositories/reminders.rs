use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::reminders::InsertReminderEntity;

#[automock]
#[async_trait]
pub trait ReminderRepository {
    /// (subscription, type) is the dedup key for at-most-once delivery.
    async fn exists(&self, subscription_id: Uuid, reminder_type: &str) -> Result<bool>;

    async fn insert(&self, insert_reminder_entity: InsertReminderEntity) -> Result<Uuid>;
}
