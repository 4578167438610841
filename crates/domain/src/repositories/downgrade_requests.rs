use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::entities::downgrade_requests::{DowngradeRequestEntity, InsertDowngradeRequestEntity};

#[automock]
#[async_trait]
pub trait DowngradeRequestRepository {
    async fn insert(&self, insert_entity: InsertDowngradeRequestEntity) -> Result<Uuid>;

    /// The at-most-one-pending-request-per-user invariant is enforced by
    /// checking this before every insert.
    async fn find_pending_for_user(&self, user_id: Uuid) -> Result<Option<DowngradeRequestEntity>>;

    /// A pending request owned by the given user. Cancelling goes through this
    /// lookup, so executed or foreign requests surface as not found.
    async fn find_pending_owned(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DowngradeRequestEntity>>;

    /// The pending request the expiry sweep should apply for a period-ended
    /// subscription: same user, same current plan, scheduled exactly for the
    /// period end.
    async fn find_matching_pending(
        &self,
        user_id: Uuid,
        current_plan_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> Result<Option<DowngradeRequestEntity>>;

    async fn mark_executed(&self, request_id: Uuid) -> Result<()>;

    async fn mark_cancelled(&self, request_id: Uuid) -> Result<()>;

    /// Immediate plan changes supersede any scheduled downgrade.
    async fn delete_pending_for_user(&self, user_id: Uuid) -> Result<()>;
}
