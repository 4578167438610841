use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use domain::{
    entities::{reminders::InsertReminderEntity, subscriptions::SubscriptionEntity},
    repositories::{
        plans::PlanRepository, reminders::ReminderRepository, subscriptions::SubscriptionRepository,
    },
};

use crate::notifications::{
    NotificationKind, NotificationSender, NotificationTemplates, format_minor_amount,
    send_templated,
};

const RENEWAL_REMINDER: &str = "renewal_reminder";

/// Look-ahead window for upcoming renewals. The tolerance absorbs the sweep's
/// run cadence so an hourly schedule cannot skip over a subscription.
#[derive(Debug, Clone, Copy)]
pub struct ReminderPolicy {
    pub lookahead_days: i64,
    pub tolerance_secs: i64,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            lookahead_days: 7,
            tolerance_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderSweepResult {
    pub scanned: usize,
    pub sent: usize,
    pub already_reminded: usize,
    pub errored: usize,
}

pub struct RenewalReminderUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    plan_repo: Arc<dyn PlanRepository + Send + Sync>,
    reminder_repo: Arc<dyn ReminderRepository + Send + Sync>,
    notifier: Arc<dyn NotificationSender>,
    templates: NotificationTemplates,
    policy: ReminderPolicy,
    currency: String,
    site_name: String,
}

impl RenewalReminderUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        plan_repo: Arc<dyn PlanRepository + Send + Sync>,
        reminder_repo: Arc<dyn ReminderRepository + Send + Sync>,
        notifier: Arc<dyn NotificationSender>,
        templates: NotificationTemplates,
        policy: ReminderPolicy,
        currency: String,
        site_name: String,
    ) -> Self {
        Self {
            subscription_repo,
            plan_repo,
            reminder_repo,
            notifier,
            templates,
            policy,
            currency,
            site_name,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReminderSweepResult> {
        if self.templates.renewal_reminder.is_none() {
            info!("renewal_reminders: no template configured; sweep disabled");
            return Ok(ReminderSweepResult::default());
        }

        let target = now + Duration::days(self.policy.lookahead_days);
        let from = target - Duration::seconds(self.policy.tolerance_secs);
        let to = target + Duration::seconds(self.policy.tolerance_secs);

        let subscriptions = self.subscription_repo.list_renewing_in_window(from, to).await?;

        let mut result = ReminderSweepResult {
            scanned: subscriptions.len(),
            ..Default::default()
        };

        for subscription in subscriptions {
            match self.remind(&subscription, now).await {
                Ok(true) => result.sent += 1,
                Ok(false) => result.already_reminded += 1,
                Err(err) => {
                    error!(
                        subscription_id = %subscription.id,
                        error = ?err,
                        "renewal_reminders: failed to process subscription; continuing"
                    );
                    result.errored += 1;
                }
            }
        }

        info!(
            scanned = result.scanned,
            sent = result.sent,
            already_reminded = result.already_reminded,
            errored = result.errored,
            "renewal_reminders: completed"
        );

        Ok(result)
    }

    async fn remind(&self, subscription: &SubscriptionEntity, now: DateTime<Utc>) -> Result<bool> {
        if self
            .reminder_repo
            .exists(subscription.id, RENEWAL_REMINDER)
            .await?
        {
            return Ok(false);
        }

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
                "amount",
                format_minor_amount(
                    plan.as_ref()
                        .map(|p| i64::from(p.monthly_price_minor))
                        .unwrap_or(0),
                ),
            ),
            ("currency", self.currency.clone()),
            (
                "enddate",
                subscription.ends_at.format("%Y-%m-%d").to_string(),
            ),
            ("site", self.site_name.clone()),
        ]);

        let sent = send_templated(
            &self.notifier,
            &self.templates,
            subscription.user_id,
            NotificationKind::RenewalReminder,
            &replacements,
        )
        .await;

        if !sent {
            warn!(
                subscription_id = %subscription.id,
                "renewal_reminders: delivery failed; will retry next run"
            );
            anyhow::bail!("reminder delivery failed");
        }

        // Recorded only after a successful send; the dedup key then blocks
        // every later run.
        self.reminder_repo
            .insert(InsertReminderEntity {
                subscription_id: subscription.id,
                reminder_type: RENEWAL_REMINDER.to_string(),
                sent_at: now,
            })
            .await?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use uuid::Uuid;

    use domain::entities::plans::PlanEntity;
    use domain::repositories::{
        plans::MockPlanRepository, reminders::MockReminderRepository,
        subscriptions::MockSubscriptionRepository,
    };

    use crate::notifications::MockNotificationSender;

    use super::*;

    fn renewing_subscription(plan_id: Uuid, ends_in_days: i64) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id,
            status: "active".to_string(),
            starts_at: now - Duration::days(23),
            ends_at: now + Duration::days(ends_in_days),
            auto_renew: true,
            cancelled_at: None,
            last_payment_id: None,
            created_at: now - Duration::days(23),
            updated_at: now,
        }
    }

    fn standard_plan() -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            shortname: "standard".to_string(),
            fullname: "Standard Plan".to_string(),
            monthly_price_minor: 24900,
            tier_rank: 2,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn templates() -> NotificationTemplates {
        NotificationTemplates {
            receipt: None,
            renewal_reminder: Some("{plan} renews on {enddate} for {amount} {currency}".to_string()),
            renewal_failed: None,
            subscription_expired: None,
        }
    }

    fn build(
        subscription_repo: MockSubscriptionRepository,
        plan_repo: MockPlanRepository,
        reminder_repo: MockReminderRepository,
        notifier: MockNotificationSender,
    ) -> RenewalReminderUseCase {
        RenewalReminderUseCase::new(
            Arc::new(subscription_repo),
            Arc::new(plan_repo),
            Arc::new(reminder_repo),
            Arc::new(notifier),
            templates(),
            ReminderPolicy::default(),
            "ETB".to_string(),
            "Test Academy".to_string(),
        )
    }

    #[tokio::test]
    async fn sends_a_reminder_once_and_records_the_dedup_row() {
        let plan = standard_plan();
        let subscription = renewing_subscription(plan.id, 7);
        let subscription_id = subscription.id;

        let mut subscription_repo = MockSubscriptionRepository::new();
        let sub_clone = subscription.clone();
        subscription_repo
            .expect_list_renewing_in_window()
            .returning(move |_, _| Ok(vec![sub_clone.clone()]));

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_active_by_id()
            .returning(move |_| Ok(Some(plan.clone())));

        let mut reminder_repo = MockReminderRepository::new();
        reminder_repo
            .expect_exists()
            .with(eq(subscription_id), eq(RENEWAL_REMINDER))
            .returning(|_, _| Ok(false));
        reminder_repo
            .expect_insert()
            .withf(move |entity| {
                entity.subscription_id == subscription_id
                    && entity.reminder_type == RENEWAL_REMINDER
            })
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));

        let mut notifier = MockNotificationSender::new();
        notifier
            .expect_send()
            .withf(|_, _, body| body.contains("Standard Plan") && body.contains("249.00"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let result = build(subscription_repo, plan_repo, reminder_repo, notifier)
            .run(Utc::now())
            .await
            .unwrap();

        assert_eq!(result.sent, 1);
        assert_eq!(result.already_reminded, 0);
    }

    #[tokio::test]
    async fn an_existing_reminder_row_suppresses_resending() {
        let subscription = renewing_subscription(Uuid::new_v4(), 7);

        let mut subscription_repo = MockSubscriptionRepository::new();
        let sub_clone = subscription.clone();
        subscription_repo
            .expect_list_renewing_in_window()
            .returning(move |_, _| Ok(vec![sub_clone.clone()]));

        let mut reminder_repo = MockReminderRepository::new();
        reminder_repo.expect_exists().returning(|_, _| Ok(true));
        // No send and no insert.

        let result = build(
            subscription_repo,
            MockPlanRepository::new(),
            reminder_repo,
            MockNotificationSender::new(),
        )
        .run(Utc::now())
        .await
        .unwrap();

        assert_eq!(result.sent, 0);
        assert_eq!(result.already_reminded, 1);
    }

    #[tokio::test]
    async fn a_failed_delivery_is_not_recorded_and_counts_as_an_error() {
        let plan = standard_plan();
        let subscription = renewing_subscription(plan.id, 7);

        let mut subscription_repo = MockSubscriptionRepository::new();
        let sub_clone = subscription.clone();
        subscription_repo
            .expect_list_renewing_in_window()
            .returning(move |_, _| Ok(vec![sub_clone.clone()]));

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_active_by_id()
            .returning(move |_| Ok(Some(plan.clone())));

        let mut reminder_repo = MockReminderRepository::new();
        reminder_repo.expect_exists().returning(|_, _| Ok(false));
        // No insert: a failed send must stay retryable.

        let mut notifier = MockNotificationSender::new();
        notifier
            .expect_send()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("relay unavailable")));

        let result = build(subscription_repo, plan_repo, reminder_repo, notifier)
            .run(Utc::now())
            .await
            .unwrap();

        assert_eq!(result.sent, 0);
        assert_eq!(result.errored, 1);
    }
}
