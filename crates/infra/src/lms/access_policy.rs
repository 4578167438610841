use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use application::access_policy::AccessPolicy;

/// Staff roster resolved once at startup from deployment configuration.
/// Everyone not on it is a plain learner.
pub struct StaffListAccessPolicy {
    staff_user_ids: HashSet<Uuid>,
}

impl StaffListAccessPolicy {
    pub fn new(staff_user_ids: Vec<Uuid>) -> Self {
        Self {
            staff_user_ids: staff_user_ids.into_iter().collect(),
        }
    }
}

#[async_trait]
impl AccessPolicy for StaffListAccessPolicy {
    async fn is_plain_learner(&self, user_id: Uuid) -> Result<bool> {
        Ok(!self.staff_user_ids.contains(&user_id))
    }
}
