use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Host-system capability answering one question: is this user an ordinary
/// learner? Staff, managers, and admins are never shown purchase flows.
/// Resolved by the LMS adapter; the engine never walks role assignments
/// itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn is_plain_learner(&self, user_id: Uuid) -> Result<bool>;
}
