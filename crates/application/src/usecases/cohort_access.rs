use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};
use uuid::Uuid;

use domain::repositories::cohorts::CohortStore;

/// Access-group ids per tier rank, plus the free-preview group everyone
/// without a subscription belongs to. Any id may be left unconfigured; that
/// group is then skipped rather than treated as an error.
#[derive(Debug, Clone, Default)]
pub struct CohortGroups {
    pub free_preview: Option<Uuid>,
    pub basic: Option<Uuid>,
    pub standard: Option<Uuid>,
    pub premium: Option<Uuid>,
}

impl CohortGroups {
    fn ranked(&self) -> [(i32, Option<Uuid>); 3] {
        [(1, self.basic), (2, self.standard), (3, self.premium)]
    }
}

pub struct CohortAccessUseCase {
    cohort_store: Arc<dyn CohortStore + Send + Sync>,
    groups: CohortGroups,
}

impl CohortAccessUseCase {
    pub fn new(cohort_store: Arc<dyn CohortStore + Send + Sync>, groups: CohortGroups) -> Self {
        Self {
            cohort_store,
            groups,
        }
    }

    /// Reconciles group memberships with the user's entitled tier rank.
    /// Access is hierarchical: tier k implies membership in every tier group
    /// up to k. `None` means no active subscription, which removes all paid
    /// groups and parks the user in free preview. Safe to call repeatedly.
    pub async fn reconcile_access(&self, user_id: Uuid, entitled_rank: Option<i32>) -> Result<()> {
        for (rank, group) in self.groups.ranked() {
            let Some(cohort_id) = group else {
                debug!(rank, "cohort_access: tier group not configured; skipping");
                continue;
            };

            let entitled = matches!(entitled_rank, Some(k) if rank <= k);
            if entitled {
                if !self.cohort_store.is_member(cohort_id, user_id).await? {
                    self.cohort_store.add_member(cohort_id, user_id).await?;
                }
            } else {
                self.cohort_store.remove_member(cohort_id, user_id).await?;
            }
        }

        match self.groups.free_preview {
            Some(cohort_id) if entitled_rank.is_some() => {
                self.cohort_store.remove_member(cohort_id, user_id).await?;
            }
            Some(cohort_id) => {
                if !self.cohort_store.is_member(cohort_id, user_id).await? {
                    self.cohort_store.add_member(cohort_id, user_id).await?;
                }
            }
            None => {
                debug!("cohort_access: free preview group not configured; skipping");
            }
        }

        info!(
            %user_id,
            entitled_rank = ?entitled_rank,
            "cohort_access: memberships reconciled"
        );

        Ok(())
    }
}
