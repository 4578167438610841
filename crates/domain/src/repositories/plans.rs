use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::plans::PlanEntity;

#[automock]
#[async_trait]
pub trait PlanRepository {
    async fn find_active_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>>;

    async fn find_active_by_shortname(&self, shortname: &str) -> Result<Option<PlanEntity>>;

    /// Active plans ordered by ascending tier rank.
    async fn list_active(&self) -> Result<Vec<PlanEntity>>;

    /// Whether any active plan sits below the given tier rank. Used to reject
    /// downgrades from the lowest tier.
    async fn exists_active_below_rank(&self, tier_rank: i32) -> Result<bool>;
}
