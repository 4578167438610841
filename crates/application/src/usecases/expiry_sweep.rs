use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Months, Utc};
use tracing::{error, info, warn};

use domain::{
    entities::{subscription_logs::InsertSubscriptionLogEntity, subscriptions::SubscriptionEntity},
    repositories::{
        downgrade_requests::DowngradeRequestRepository, plans::PlanRepository,
        subscription_logs::SubscriptionLogRepository, subscriptions::SubscriptionRepository,
    },
};

use crate::notifications::{
    NotificationKind, NotificationSender, NotificationTemplates, send_templated,
};
use crate::usecases::cohort_access::CohortAccessUseCase;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpirySweepResult {
    pub scanned: usize,
    pub expired: usize,
    pub downgraded: usize,
    pub skipped_renewing: usize,
    pub errored: usize,
}

enum SweepAction {
    Expired,
    Downgraded,
    SkippedRenewing,
}

/// Batch reconciliation of period-ended subscriptions. Re-entrant: the query
/// only selects still-active rows, so an overlapping or repeated run finds
/// nothing left to do.
pub struct ExpirySweepUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    plan_repo: Arc<dyn PlanRepository + Send + Sync>,
    downgrade_repo: Arc<dyn DowngradeRequestRepository + Send + Sync>,
    log_repo: Arc<dyn SubscriptionLogRepository + Send + Sync>,
    cohort_access: Arc<CohortAccessUseCase>,
    notifier: Arc<dyn NotificationSender>,
    templates: NotificationTemplates,
    currency: String,
    site_name: String,
}

impl ExpirySweepUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        plan_repo: Arc<dyn PlanRepository + Send + Sync>,
        downgrade_repo: Arc<dyn DowngradeRequestRepository + Send + Sync>,
        log_repo: Arc<dyn SubscriptionLogRepository + Send + Sync>,
        cohort_access: Arc<CohortAccessUseCase>,
        notifier: Arc<dyn NotificationSender>,
        templates: NotificationTemplates,
        currency: String,
        site_name: String,
    ) -> Self {
        Self {
            subscription_repo,
            plan_repo,
            downgrade_repo,
            log_repo,
            cohort_access,
            notifier,
            templates,
            currency,
            site_name,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<ExpirySweepResult> {
        let subscriptions = self.subscription_repo.list_period_ended(now).await?;

        let mut result = ExpirySweepResult {
            scanned: subscriptions.len(),
            ..Default::default()
        };

        for subscription in subscriptions {
            match self.process_subscription(&subscription, now).await {
                Ok(SweepAction::Expired) => result.expired += 1,
                Ok(SweepAction::Downgraded) => result.downgraded += 1,
                Ok(SweepAction::SkippedRenewing) => result.skipped_renewing += 1,
                Err(err) => {
                    error!(
                        subscription_id = %subscription.id,
                        error = ?err,
                        "expiry_sweep: failed to process subscription; continuing"
                    );
                    result.errored += 1;
                }
            }
        }

        info!(
            scanned = result.scanned,
            expired = result.expired,
            downgraded = result.downgraded,
            skipped_renewing = result.skipped_renewing,
            errored = result.errored,
            "expiry_sweep: completed"
        );

        Ok(result)
    }

    async fn process_subscription(
        &self,
        subscription: &SubscriptionEntity,
        now: DateTime<Utc>,
    ) -> Result<SweepAction> {
        // A downgrade scheduled exactly for this period end takes priority
        // over expiring the row.
        if let Some(request) = self
            .downgrade_repo
            .find_matching_pending(subscription.user_id, subscription.plan_id, subscription.ends_at)
            .await?
        {
            let target = self
                .plan_repo
                .find_active_by_id(request.target_plan_id)
                .await?
                .ok_or_else(|| anyhow!("downgrade target plan is missing or inactive"))?;

            let new_ends_at = now
                .checked_add_months(Months::new(1))
                .context("failed to compute new period end")?;

            self.subscription_repo
                .apply_plan_change(subscription.id, target.id, Some(new_ends_at))
                .await?;
            self.cohort_access
                .reconcile_access(subscription.user_id, Some(target.tier_rank))
                .await?;
            self.downgrade_repo.mark_executed(request.id).await?;

            self.log(InsertSubscriptionLogEntity {
                user_id: subscription.user_id,
                subscription_id: Some(subscription.id),
                action: "downgrade".to_string(),
                from_plan_id: Some(subscription.plan_id),
                to_plan_id: Some(target.id),
                amount_minor: 0,
                currency: self.currency.clone(),
                payment_id: None,
                reason: "Scheduled downgrade executed".to_string(),
            })
            .await;

            info!(
                subscription_id = %subscription.id,
                target_plan = %target.shortname,
                "expiry_sweep: scheduled downgrade applied"
            );
            return Ok(SweepAction::Downgraded);
        }

        // Auto-renewing rows are left alone; the gateway's recurring charge
        // and its webhook own that renewal.
        if subscription.auto_renew {
            return Ok(SweepAction::SkippedRenewing);
        }

        self.subscription_repo.mark_expired(subscription.id).await?;
        self.cohort_access
            .reconcile_access(subscription.user_id, None)
            .await?;

        let plan = self
            .plan_repo
            .find_active_by_id(subscription.plan_id)
            .await
            .unwrap_or_default();
        let replacements = HashMap::from([
            (
                "plan",
                plan.as_ref().map(|p| p.fullname.clone()).unwrap_or_default(),
            ),
            (
                "enddate",
                subscription.ends_at.format("%Y-%m-%d").to_string(),
            ),
            ("site", self.site_name.clone()),
        ]);
        send_templated(
            &self.notifier,
            &self.templates,
            subscription.user_id,
            NotificationKind::SubscriptionExpired,
            &replacements,
        )
        .await;

        self.log(InsertSubscriptionLogEntity {
            user_id: subscription.user_id,
            subscription_id: Some(subscription.id),
            action: "expired".to_string(),
            from_plan_id: Some(subscription.plan_id),
            to_plan_id: None,
            amount_minor: 0,
            currency: self.currency.clone(),
            payment_id: None,
            reason: "Period ended without renewal".to_string(),
        })
        .await;

        info!(subscription_id = %subscription.id, "expiry_sweep: subscription expired");
        Ok(SweepAction::Expired)
    }

    async fn log(&self, entry: InsertSubscriptionLogEntity) {
        if let Err(err) = self.log_repo.insert(entry).await {
            warn!(db_error = ?err, "expiry_sweep: failed to write log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mockall::predicate::eq;
    use uuid::Uuid;

    use domain::entities::downgrade_requests::DowngradeRequestEntity;
    use domain::entities::plans::PlanEntity;
    use domain::repositories::{
        cohorts::MockCohortStore, downgrade_requests::MockDowngradeRequestRepository,
        plans::MockPlanRepository, subscription_logs::MockSubscriptionLogRepository,
        subscriptions::MockSubscriptionRepository,
    };

    use crate::notifications::MockNotificationSender;
    use crate::usecases::cohort_access::CohortGroups;

    use super::*;

    fn make_plan(shortname: &str, tier_rank: i32) -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            shortname: shortname.to_string(),
            fullname: format!("{} Plan", shortname),
            monthly_price_minor: 24900,
            tier_rank,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn past_due_subscription(plan_id: Uuid, auto_renew: bool) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id,
            status: "active".to_string(),
            starts_at: now - Duration::days(40),
            ends_at: now - Duration::days(2),
            auto_renew,
            cancelled_at: None,
            last_payment_id: None,
            created_at: now - Duration::days(40),
            updated_at: now - Duration::days(2),
        }
    }

    fn templates() -> NotificationTemplates {
        NotificationTemplates {
            receipt: None,
            renewal_reminder: None,
            renewal_failed: None,
            subscription_expired: Some("{plan} expired on {enddate}".to_string()),
        }
    }

    struct SweepMocks {
        subscription_repo: MockSubscriptionRepository,
        plan_repo: MockPlanRepository,
        downgrade_repo: MockDowngradeRequestRepository,
        log_repo: MockSubscriptionLogRepository,
        cohort_store: MockCohortStore,
        notifier: MockNotificationSender,
        groups: CohortGroups,
    }

    impl SweepMocks {
        fn new() -> Self {
            Self {
                subscription_repo: MockSubscriptionRepository::new(),
                plan_repo: MockPlanRepository::new(),
                downgrade_repo: MockDowngradeRequestRepository::new(),
                log_repo: MockSubscriptionLogRepository::new(),
                cohort_store: MockCohortStore::new(),
                notifier: MockNotificationSender::new(),
                groups: CohortGroups::default(),
            }
        }

        fn into_usecase(self) -> ExpirySweepUseCase {
            ExpirySweepUseCase::new(
                Arc::new(self.subscription_repo),
                Arc::new(self.plan_repo),
                Arc::new(self.downgrade_repo),
                Arc::new(self.log_repo),
                Arc::new(CohortAccessUseCase::new(
                    Arc::new(self.cohort_store),
                    self.groups,
                )),
                Arc::new(self.notifier),
                templates(),
                "ETB".to_string(),
                "Test Academy".to_string(),
            )
        }
    }

    #[tokio::test]
    async fn non_renewing_past_due_rows_expire_into_free_preview() {
        let plan = make_plan("standard", 2);
        let subscription = past_due_subscription(plan.id, false);
        let subscription_id = subscription.id;
        let user_id = subscription.user_id;

        let free = Uuid::new_v4();
        let basic = Uuid::new_v4();
        let standard = Uuid::new_v4();
        let premium = Uuid::new_v4();

        let mut mocks = SweepMocks::new();
        mocks.groups = CohortGroups {
            free_preview: Some(free),
            basic: Some(basic),
            standard: Some(standard),
            premium: Some(premium),
        };
        let sub_clone = subscription.clone();
        mocks
            .subscription_repo
            .expect_list_period_ended()
            .returning(move |_| Ok(vec![sub_clone.clone()]));
        mocks
            .downgrade_repo
            .expect_find_matching_pending()
            .returning(|_, _, _| Ok(None));
        mocks
            .subscription_repo
            .expect_mark_expired()
            .with(eq(subscription_id))
            .times(1)
            .returning(|_| Ok(()));
        for cohort_id in [basic, standard, premium] {
            mocks
                .cohort_store
                .expect_remove_member()
                .with(eq(cohort_id), eq(user_id))
                .times(1)
                .returning(|_, _| Ok(()));
        }
        mocks
            .cohort_store
            .expect_is_member()
            .with(eq(free), eq(user_id))
            .times(1)
            .returning(|_, _| Ok(false));
        mocks
            .cohort_store
            .expect_add_member()
            .with(eq(free), eq(user_id))
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .returning(move |_| Ok(Some(plan.clone())));
        mocks
            .notifier
            .expect_send()
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks
            .log_repo
            .expect_insert()
            .withf(|entry| entry.action == "expired")
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));

        let result = mocks.into_usecase().run(Utc::now()).await.unwrap();

        assert_eq!(result.scanned, 1);
        assert_eq!(result.expired, 1);
        assert_eq!(result.downgraded, 0);
    }

    #[tokio::test]
    async fn matching_pending_downgrade_takes_priority_over_expiry() {
        let premium_plan = make_plan("premium", 3);
        let basic_plan = make_plan("basic", 1);
        let subscription = past_due_subscription(premium_plan.id, true);
        let subscription_id = subscription.id;
        let user_id = subscription.user_id;
        let request = DowngradeRequestEntity {
            id: Uuid::new_v4(),
            user_id,
            current_plan_id: premium_plan.id,
            target_plan_id: basic_plan.id,
            status: "pending".to_string(),
            requested_at: subscription.starts_at,
            scheduled_for: subscription.ends_at,
            executed_at: None,
            cancelled_at: None,
        };
        let request_id = request.id;
        let basic_group = Uuid::new_v4();
        let basic_plan_id = basic_plan.id;

        let mut mocks = SweepMocks::new();
        mocks.groups = CohortGroups {
            free_preview: None,
            basic: Some(basic_group),
            standard: None,
            premium: None,
        };
        let sub_clone = subscription.clone();
        mocks
            .subscription_repo
            .expect_list_period_ended()
            .returning(move |_| Ok(vec![sub_clone.clone()]));
        mocks
            .downgrade_repo
            .expect_find_matching_pending()
            .with(
                eq(user_id),
                eq(subscription.plan_id),
                eq(subscription.ends_at),
            )
            .returning(move |_, _, _| Ok(Some(request.clone())));
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .with(eq(basic_plan_id))
            .returning(move |_| Ok(Some(basic_plan.clone())));
        mocks
            .subscription_repo
            .expect_apply_plan_change()
            .withf(move |id, plan_id, new_ends_at| {
                *id == subscription_id && *plan_id == basic_plan_id && new_ends_at.is_some()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks
            .cohort_store
            .expect_is_member()
            .with(eq(basic_group), eq(user_id))
            .times(1)
            .returning(|_, _| Ok(false));
        mocks
            .cohort_store
            .expect_add_member()
            .with(eq(basic_group), eq(user_id))
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .downgrade_repo
            .expect_mark_executed()
            .with(eq(request_id))
            .times(1)
            .returning(|_| Ok(()));
        mocks
            .log_repo
            .expect_insert()
            .withf(|entry| entry.action == "downgrade")
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));
        // No mark_expired and no expiry notification.

        let result = mocks.into_usecase().run(Utc::now()).await.unwrap();

        assert_eq!(result.downgraded, 1);
        assert_eq!(result.expired, 0);
    }

    #[tokio::test]
    async fn auto_renewing_rows_without_a_downgrade_are_left_alone() {
        let subscription = past_due_subscription(Uuid::new_v4(), true);

        let mut mocks = SweepMocks::new();
        let sub_clone = subscription.clone();
        mocks
            .subscription_repo
            .expect_list_period_ended()
            .returning(move |_| Ok(vec![sub_clone.clone()]));
        mocks
            .downgrade_repo
            .expect_find_matching_pending()
            .returning(|_, _, _| Ok(None));

        let result = mocks.into_usecase().run(Utc::now()).await.unwrap();

        assert_eq!(result.skipped_renewing, 1);
        assert_eq!(result.expired, 0);
    }

    #[tokio::test]
    async fn one_failing_row_does_not_abort_the_batch() {
        let plan = make_plan("basic", 1);
        let failing = past_due_subscription(plan.id, false);
        let healthy = past_due_subscription(plan.id, false);
        let healthy_id = healthy.id;

        let mut mocks = SweepMocks::new();
        let rows = vec![failing.clone(), healthy.clone()];
        mocks
            .subscription_repo
            .expect_list_period_ended()
            .returning(move |_| Ok(rows.clone()));
        mocks
            .downgrade_repo
            .expect_find_matching_pending()
            .times(1)
            .returning(|_, _, _| Err(anyhow!("connection reset")));
        mocks
            .downgrade_repo
            .expect_find_matching_pending()
            .times(1)
            .returning(|_, _, _| Ok(None));
        mocks
            .subscription_repo
            .expect_mark_expired()
            .with(eq(healthy_id))
            .times(1)
            .returning(|_| Ok(()));
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .returning(move |_| Ok(Some(plan.clone())));
        mocks
            .notifier
            .expect_send()
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks
            .log_repo
            .expect_insert()
            .returning(|_| Ok(Uuid::new_v4()));

        let result = mocks.into_usecase().run(Utc::now()).await.unwrap();

        assert_eq!(result.scanned, 2);
        assert_eq!(result.errored, 1);
        assert_eq!(result.expired, 1);
    }
}
