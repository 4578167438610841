use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn insert(&self, insert_subscription_entity: InsertSubscriptionEntity) -> Result<Uuid>;

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// The user's effective subscription: the most recently modified active
    /// row. Older active rows are historical and only kept for audit.
    async fn find_current_active(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn mark_active(&self, subscription_id: Uuid) -> Result<()>;

    async fn mark_cancelled(&self, subscription_id: Uuid) -> Result<()>;

    async fn mark_expired(&self, subscription_id: Uuid) -> Result<()>;

    async fn set_auto_renew(&self, subscription_id: Uuid, auto_renew: bool) -> Result<()>;

    async fn set_last_payment(&self, subscription_id: Uuid, payment_id: Uuid) -> Result<()>;

    /// Switches the plan, forces the row active with auto-renew on, and moves
    /// the period end when a new one is supplied.
    async fn apply_plan_change(
        &self,
        subscription_id: Uuid,
        plan_id: Uuid,
        new_ends_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Active subscriptions whose period end has passed. Expired and cancelled
    /// rows are excluded so the expiry sweep stays idempotent across runs.
    async fn list_period_ended(&self, now: DateTime<Utc>) -> Result<Vec<SubscriptionEntity>>;

    /// Active auto-renewing subscriptions ending inside the window.
    async fn list_renewing_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionEntity>>;
}
