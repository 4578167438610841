use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

/// Membership store for the host LMS access groups. Adds and removes must be
/// idempotent; the access mapper calls them without checking first.
#[automock]
#[async_trait]
pub trait CohortStore {
    async fn add_member(&self, cohort_id: Uuid, user_id: Uuid) -> Result<()>;

    async fn remove_member(&self, cohort_id: Uuid, user_id: Uuid) -> Result<()>;

    async fn is_member(&self, cohort_id: Uuid, user_id: Uuid) -> Result<bool>;
}
