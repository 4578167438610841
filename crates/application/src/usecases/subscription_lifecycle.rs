use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Months, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use domain::{
    entities::{
        cancellations::InsertCancellationEntity,
        payments::InsertPaymentEntity,
        plans::PlanEntity,
        subscription_logs::InsertSubscriptionLogEntity,
        subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    },
    repositories::{
        cancellations::CancellationRepository, downgrade_requests::DowngradeRequestRepository,
        payments::PaymentRepository, plans::PlanRepository,
        subscription_logs::SubscriptionLogRepository, subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::{
            payment_kinds::PaymentKind, payment_statuses::PaymentStatus,
            subscription_statuses::SubscriptionStatus,
        },
        iam::Actor,
        payment_reference::PaymentReference,
        pricing::{self, BillingDuration, DiscountTable},
        subscriptions::{
            CheckoutDto, CurrentSubscriptionDto, PlanDto, PurchaseOfferDto, PurchaserContact,
        },
    },
};

use crate::access_policy::AccessPolicy;
use crate::gateway::{ChapaGateway, InitializeTransaction};
use crate::notifications::{
    NotificationKind, NotificationSender, NotificationTemplates, format_minor_amount,
    send_templated,
};
use crate::usecases::cohort_access::CohortAccessUseCase;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("unknown or inactive plan")]
    InvalidPlan,
    #[error("subscription, payment, or request not found")]
    NotFound,
    #[error("operation target is not owned by the caller")]
    OwnershipMismatch,
    #[error("a downgrade request is already pending")]
    AlreadyScheduled,
    #[error("no lower tier is available to downgrade to")]
    NoLowerTier,
    #[error("payment gateway error: {0}")]
    Gateway(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;

/// Outcome of a confirm-payment call. `AlreadyConfirmed` is the idempotent
/// no-op path taken on duplicate webhook deliveries and redundant polling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaymentConfirmation {
    Confirmed,
    AlreadyConfirmed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DowngradeOutcome {
    Scheduled {
        request_id: Uuid,
        scheduled_for: DateTime<Utc>,
    },
    /// The paid-for period had already elapsed, so deferring would protect
    /// nothing; the plan change was applied on the spot.
    AppliedImmediately,
}

/// Static knobs resolved once at startup and injected; nothing in here is
/// read from ambient process state at call time.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub currency: String,
    pub discounts: DiscountTable,
    pub templates: NotificationTemplates,
    /// Whether plan changes get an extra audit log row. Resolved from
    /// deployment configuration, not probed per call.
    pub plan_change_audit: bool,
    pub site_name: String,
}

pub struct SubscriptionLifecycleUseCase<P, S, Pay, D, C, L, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    D: DowngradeRequestRepository + Send + Sync + 'static,
    C: CancellationRepository + Send + Sync + 'static,
    L: SubscriptionLogRepository + Send + Sync + 'static,
    G: ChapaGateway + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    subscription_repo: Arc<S>,
    payment_repo: Arc<Pay>,
    downgrade_repo: Arc<D>,
    cancellation_repo: Arc<C>,
    log_repo: Arc<L>,
    gateway: Arc<G>,
    cohort_access: Arc<CohortAccessUseCase>,
    notifier: Arc<dyn NotificationSender>,
    access_policy: Arc<dyn AccessPolicy>,
    settings: LifecycleSettings,
}

impl<P, S, Pay, D, C, L, G> SubscriptionLifecycleUseCase<P, S, Pay, D, C, L, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    D: DowngradeRequestRepository + Send + Sync + 'static,
    C: CancellationRepository + Send + Sync + 'static,
    L: SubscriptionLogRepository + Send + Sync + 'static,
    G: ChapaGateway + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        plan_repo: Arc<P>,
        subscription_repo: Arc<S>,
        payment_repo: Arc<Pay>,
        downgrade_repo: Arc<D>,
        cancellation_repo: Arc<C>,
        log_repo: Arc<L>,
        gateway: Arc<G>,
        cohort_access: Arc<CohortAccessUseCase>,
        notifier: Arc<dyn NotificationSender>,
        access_policy: Arc<dyn AccessPolicy>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            plan_repo,
            subscription_repo,
            payment_repo,
            downgrade_repo,
            cancellation_repo,
            log_repo,
            gateway,
            cohort_access,
            notifier,
            access_policy,
            settings,
        }
    }

    pub async fn list_plans(&self) -> LifecycleResult<Vec<PlanDto>> {
        let plans = self.plan_repo.list_active().await.map_err(|err| {
            error!(db_error = ?err, "lifecycle: failed to list active plans");
            LifecycleError::Internal(err)
        })?;
        Ok(plans.into_iter().map(PlanDto::from).collect())
    }

    /// What the purchase UI should present. Staff accounts are never offered
    /// purchase flows, per the host system's access policy.
    pub async fn purchase_offer(&self, user_id: Uuid) -> LifecycleResult<PurchaseOfferDto> {
        let eligible = match self.access_policy.is_plain_learner(user_id).await {
            Ok(eligible) => eligible,
            Err(err) => {
                warn!(
                    %user_id,
                    error = ?err,
                    "lifecycle: access policy lookup failed; hiding purchase offer"
                );
                false
            }
        };

        Ok(PurchaseOfferDto {
            eligible,
            current: self.current_subscription(user_id).await?,
            plans: self.list_plans().await?,
        })
    }

    pub async fn current_subscription(
        &self,
        user_id: Uuid,
    ) -> LifecycleResult<Option<CurrentSubscriptionDto>> {
        let subscription = match self
            .subscription_repo
            .find_current_active(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "lifecycle: failed to load current subscription");
                LifecycleError::Internal(err)
            })? {
            Some(subscription) => subscription,
            None => return Ok(None),
        };

        let plan = match self
            .plan_repo
            .find_active_by_id(subscription.plan_id)
            .await
            .map_err(LifecycleError::Internal)?
        {
            Some(plan) => plan,
            None => {
                warn!(
                    %user_id,
                    plan_id = %subscription.plan_id,
                    "lifecycle: current subscription references an inactive plan"
                );
                return Ok(None);
            }
        };

        let pending_downgrade = self
            .downgrade_repo
            .find_pending_for_user(user_id)
            .await
            .map_err(LifecycleError::Internal)?;

        Ok(Some(CurrentSubscriptionDto {
            subscription_id: subscription.id,
            plan: PlanDto::from(plan),
            status: SubscriptionStatus::from_str(&subscription.status),
            starts_at: subscription.starts_at,
            ends_at: subscription.ends_at,
            auto_renew: subscription.auto_renew,
            pending_downgrade_to: pending_downgrade.map(|request| request.target_plan_id),
        }))
    }

    /// Creates a pending subscription plus its initial payment and starts a
    /// hosted checkout. The subscription stays pending until a verified
    /// gateway success arrives; a gateway failure here is surfaced but leaves
    /// no half-activated state behind.
    pub async fn create_subscription(
        &self,
        actor: &Actor,
        contact: &PurchaserContact,
        plan_shortname: &str,
        duration_code: &str,
    ) -> LifecycleResult<CheckoutDto> {
        let user_id = actor.user_id;
        let duration = BillingDuration::from_code(duration_code);

        info!(
            %user_id,
            plan = plan_shortname,
            duration = %duration,
            "lifecycle: subscription purchase requested"
        );

        let plan = self
            .plan_repo
            .find_active_by_shortname(plan_shortname)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "lifecycle: failed to resolve plan");
                LifecycleError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%user_id, plan = plan_shortname, "lifecycle: unknown or inactive plan");
                LifecycleError::InvalidPlan
            })?;

        let quote = pricing::quote(
            i64::from(plan.monthly_price_minor),
            duration,
            &self.settings.discounts,
        );
        let amount_minor = i32::try_from(quote.final_minor)
            .map_err(|_| LifecycleError::Internal(anyhow!("final amount out of range")))?;

        let now = Utc::now();
        let ends_at = add_months(now, duration.months())?;

        let subscription_id = self
            .subscription_repo
            .insert(InsertSubscriptionEntity {
                user_id,
                plan_id: plan.id,
                status: SubscriptionStatus::Pending.to_string(),
                starts_at: now,
                ends_at,
                auto_renew: true,
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "lifecycle: failed to insert subscription");
                LifecycleError::Internal(err)
            })?;

        let payment_id = self
            .payment_repo
            .insert(InsertPaymentEntity {
                user_id,
                subscription_id,
                kind: PaymentKind::Initial.to_string(),
                amount_minor,
                currency: self.settings.currency.clone(),
                months: duration.months(),
                discount_percent: quote.discount_percent,
                status: PaymentStatus::Pending.to_string(),
                gateway_tx_ref: None,
                payment_method: None,
                target_plan_id: None,
                error: None,
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %subscription_id,
                    db_error = ?err,
                    "lifecycle: failed to insert payment"
                );
                LifecycleError::Internal(err)
            })?;

        self.subscription_repo
            .set_last_payment(subscription_id, payment_id)
            .await
            .map_err(LifecycleError::Internal)?;

        self.log(InsertSubscriptionLogEntity {
            user_id,
            subscription_id: Some(subscription_id),
            action: "subscribe".to_string(),
            from_plan_id: None,
            to_plan_id: Some(plan.id),
            amount_minor,
            currency: self.settings.currency.clone(),
            payment_id: Some(payment_id),
            reason: "New subscription".to_string(),
        })
        .await;

        let reference = PaymentReference::new(subscription_id, now.timestamp());
        let session = self
            .gateway
            .initialize_transaction(InitializeTransaction {
                amount_minor: quote.final_minor,
                currency: self.settings.currency.clone(),
                email: contact.email.clone(),
                first_name: contact.first_name.clone(),
                last_name: contact.last_name.clone(),
                tx_ref: reference.encode(),
                description: format!("{} - {} months", plan.fullname, duration.months()),
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %subscription_id,
                    error = ?err,
                    "lifecycle: gateway initialize failed; subscription stays pending"
                );
                LifecycleError::Gateway(err.to_string())
            })?;

        self.payment_repo
            .set_gateway_tx_ref(payment_id, &session.reference)
            .await
            .map_err(LifecycleError::Internal)?;

        info!(
            %user_id,
            %subscription_id,
            %payment_id,
            amount_minor,
            "lifecycle: checkout session created"
        );

        Ok(CheckoutDto {
            subscription_id,
            payment_id,
            checkout_url: session.checkout_url,
            amount_minor,
            currency: self.settings.currency.clone(),
        })
    }

    /// Applies a verified gateway outcome to a payment. Idempotent: both the
    /// webhook and the return-URL poller call this, and only the call that
    /// wins the guarded status transition performs side effects.
    pub async fn confirm_payment(
        &self,
        payment_id: Uuid,
        actor: Option<&Actor>,
        succeeded: bool,
        gateway_ref: Option<&str>,
        payment_method: Option<&str>,
    ) -> LifecycleResult<PaymentConfirmation> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        let subscription = self
            .subscription_repo
            .find_by_id(payment.subscription_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        if let Some(actor) = actor {
            if !actor.owns(subscription.user_id) {
                warn!(
                    caller = %actor.user_id,
                    owner = %subscription.user_id,
                    %payment_id,
                    "lifecycle: payment confirmation denied for non-owner"
                );
                return Err(LifecycleError::OwnershipMismatch);
            }
        }

        if PaymentStatus::from_str(&payment.status) == PaymentStatus::Success {
            info!(%payment_id, "lifecycle: payment already confirmed; nothing to do");
            return Ok(PaymentConfirmation::AlreadyConfirmed);
        }

        if !succeeded {
            return self.confirm_payment_failure(&payment.kind, payment_id, &subscription).await;
        }

        let transitioned = self
            .payment_repo
            .mark_success(payment_id, gateway_ref, payment_method)
            .await
            .map_err(LifecycleError::Internal)?;
        if !transitioned {
            info!(%payment_id, "lifecycle: payment confirmed by a concurrent caller");
            return Ok(PaymentConfirmation::AlreadyConfirmed);
        }

        match PaymentKind::from_str(&payment.kind) {
            PaymentKind::Initial => {
                self.subscription_repo
                    .mark_active(subscription.id)
                    .await
                    .map_err(LifecycleError::Internal)?;

                let plan = self
                    .plan_repo
                    .find_active_by_id(subscription.plan_id)
                    .await
                    .map_err(LifecycleError::Internal)?;

                match plan.as_ref() {
                    Some(plan) => {
                        self.cohort_access
                            .reconcile_access(subscription.user_id, Some(plan.tier_rank))
                            .await
                            .map_err(LifecycleError::Internal)?;
                    }
                    None => {
                        warn!(
                            plan_id = %subscription.plan_id,
                            "lifecycle: plan inactive at confirmation; leaving access groups untouched"
                        );
                    }
                }

                self.log(InsertSubscriptionLogEntity {
                    user_id: subscription.user_id,
                    subscription_id: Some(subscription.id),
                    action: "payment_confirmed".to_string(),
                    from_plan_id: None,
                    to_plan_id: Some(subscription.plan_id),
                    amount_minor: payment.amount_minor,
                    currency: payment.currency.clone(),
                    payment_id: Some(payment_id),
                    reason: "Gateway confirmed payment".to_string(),
                })
                .await;

                self.send_receipt(&subscription, plan.as_ref(), &payment.currency, payment.amount_minor)
                    .await;

                info!(
                    subscription_id = %subscription.id,
                    %payment_id,
                    "lifecycle: subscription activated"
                );
            }
            PaymentKind::Upgrade => {
                let target_plan_id = payment.target_plan_id.ok_or_else(|| {
                    LifecycleError::Internal(anyhow!("upgrade payment is missing its target plan"))
                })?;
                let target = self
                    .plan_repo
                    .find_active_by_id(target_plan_id)
                    .await
                    .map_err(LifecycleError::Internal)?
                    .ok_or(LifecycleError::InvalidPlan)?;

                self.apply_immediate_plan_change(&subscription, &target, "Paid upgrade")
                    .await?;

                self.log(InsertSubscriptionLogEntity {
                    user_id: subscription.user_id,
                    subscription_id: Some(subscription.id),
                    action: "upgrade".to_string(),
                    from_plan_id: Some(subscription.plan_id),
                    to_plan_id: Some(target.id),
                    amount_minor: payment.amount_minor,
                    currency: payment.currency.clone(),
                    payment_id: Some(payment_id),
                    reason: "Upgrade payment confirmed".to_string(),
                })
                .await;

                self.send_receipt(&subscription, Some(&target), &payment.currency, payment.amount_minor)
                    .await;

                info!(
                    subscription_id = %subscription.id,
                    %payment_id,
                    target_plan = %target.shortname,
                    "lifecycle: upgrade applied"
                );
            }
        }

        Ok(PaymentConfirmation::Confirmed)
    }

    async fn confirm_payment_failure(
        &self,
        payment_kind: &str,
        payment_id: Uuid,
        subscription: &SubscriptionEntity,
    ) -> LifecycleResult<PaymentConfirmation> {
        let transitioned = self
            .payment_repo
            .mark_failed(payment_id, Some("gateway reported failure"))
            .await
            .map_err(LifecycleError::Internal)?;
        if !transitioned {
            info!(%payment_id, "lifecycle: failed payment already settled; nothing to do");
            return Ok(PaymentConfirmation::AlreadyConfirmed);
        }

        // A failed initial payment never reaches active. Failed upgrade
        // charges leave the running subscription untouched.
        if PaymentKind::from_str(payment_kind) == PaymentKind::Initial {
            self.subscription_repo
                .mark_cancelled(subscription.id)
                .await
                .map_err(LifecycleError::Internal)?;
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
            ("enddate", subscription.ends_at.format("%Y-%m-%d").to_string()),
            ("site", self.settings.site_name.clone()),
        ]);
        send_templated(
            &self.notifier,
            &self.settings.templates,
            subscription.user_id,
            NotificationKind::RenewalFailed,
            &replacements,
        )
        .await;

        self.log(InsertSubscriptionLogEntity {
            user_id: subscription.user_id,
            subscription_id: Some(subscription.id),
            action: "payment_failed".to_string(),
            from_plan_id: Some(subscription.plan_id),
            to_plan_id: None,
            amount_minor: 0,
            currency: self.settings.currency.clone(),
            payment_id: Some(payment_id),
            reason: "Gateway reported failure".to_string(),
        })
        .await;

        warn!(
            subscription_id = %subscription.id,
            %payment_id,
            "lifecycle: payment failed"
        );

        Ok(PaymentConfirmation::Failed)
    }

    /// Privileged override: force-activates without payment verification.
    pub async fn admin_activate(&self, subscription_id: Uuid) -> LifecycleResult<()> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        self.subscription_repo
            .mark_active(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?;
        self.subscription_repo
            .set_auto_renew(subscription_id, true)
            .await
            .map_err(LifecycleError::Internal)?;

        match self
            .plan_repo
            .find_active_by_id(subscription.plan_id)
            .await
            .map_err(LifecycleError::Internal)?
        {
            Some(plan) => {
                self.cohort_access
                    .reconcile_access(subscription.user_id, Some(plan.tier_rank))
                    .await
                    .map_err(LifecycleError::Internal)?;
            }
            None => {
                warn!(
                    %subscription_id,
                    plan_id = %subscription.plan_id,
                    "lifecycle: plan inactive on admin activation; leaving access groups untouched"
                );
            }
        }

        self.log(InsertSubscriptionLogEntity {
            user_id: subscription.user_id,
            subscription_id: Some(subscription_id),
            action: "admin_activate".to_string(),
            from_plan_id: None,
            to_plan_id: Some(subscription.plan_id),
            amount_minor: 0,
            currency: self.settings.currency.clone(),
            payment_id: None,
            reason: "Admin activation".to_string(),
        })
        .await;

        info!(%subscription_id, "lifecycle: subscription activated by admin");
        Ok(())
    }

    /// Admin plan change: applies immediately in either direction and
    /// supersedes any scheduled downgrade.
    pub async fn admin_change_plan(
        &self,
        subscription_id: Uuid,
        new_plan_id: Uuid,
    ) -> LifecycleResult<()> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        let new_plan = self
            .plan_repo
            .find_active_by_id(new_plan_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::InvalidPlan)?;

        self.apply_immediate_plan_change(&subscription, &new_plan, "Admin change")
            .await?;

        info!(
            %subscription_id,
            new_plan = %new_plan.shortname,
            "lifecycle: plan changed by admin"
        );
        Ok(())
    }

    /// Starts a paid upgrade: charges the monthly rate difference and defers
    /// the plan change until the gateway confirms the upgrade payment.
    pub async fn request_upgrade(
        &self,
        actor: &Actor,
        contact: &PurchaserContact,
        subscription_id: Uuid,
        target_plan_id: Uuid,
    ) -> LifecycleResult<CheckoutDto> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        if !actor.owns(subscription.user_id) {
            return Err(LifecycleError::OwnershipMismatch);
        }
        if SubscriptionStatus::from_str(&subscription.status) != SubscriptionStatus::Active {
            return Err(LifecycleError::NotFound);
        }

        let current_plan = self
            .plan_repo
            .find_active_by_id(subscription.plan_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::InvalidPlan)?;
        let target_plan = self
            .plan_repo
            .find_active_by_id(target_plan_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::InvalidPlan)?;

        if target_plan.tier_rank <= current_plan.tier_rank {
            warn!(
                %subscription_id,
                current = %current_plan.shortname,
                target = %target_plan.shortname,
                "lifecycle: upgrade target is not a higher tier"
            );
            return Err(LifecycleError::InvalidPlan);
        }

        let difference_minor = target_plan.monthly_price_minor - current_plan.monthly_price_minor;

        let payment_id = self
            .payment_repo
            .insert(InsertPaymentEntity {
                user_id: subscription.user_id,
                subscription_id,
                kind: PaymentKind::Upgrade.to_string(),
                amount_minor: difference_minor,
                currency: self.settings.currency.clone(),
                months: 1,
                discount_percent: 0,
                status: PaymentStatus::Pending.to_string(),
                gateway_tx_ref: None,
                payment_method: None,
                target_plan_id: Some(target_plan.id),
                error: None,
            })
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "lifecycle: failed to insert upgrade payment");
                LifecycleError::Internal(err)
            })?;

        let reference = PaymentReference::new(subscription_id, Utc::now().timestamp());
        let session = self
            .gateway
            .initialize_transaction(InitializeTransaction {
                amount_minor: i64::from(difference_minor),
                currency: self.settings.currency.clone(),
                email: contact.email.clone(),
                first_name: contact.first_name.clone(),
                last_name: contact.last_name.clone(),
                tx_ref: reference.encode(),
                description: format!("Plan upgrade - {}", target_plan.fullname),
            })
            .await
            .map_err(|err| {
                error!(%subscription_id, error = ?err, "lifecycle: gateway initialize failed for upgrade");
                LifecycleError::Gateway(err.to_string())
            })?;

        self.payment_repo
            .set_gateway_tx_ref(payment_id, &session.reference)
            .await
            .map_err(LifecycleError::Internal)?;

        self.log(InsertSubscriptionLogEntity {
            user_id: subscription.user_id,
            subscription_id: Some(subscription_id),
            action: "upgrade_requested".to_string(),
            from_plan_id: Some(current_plan.id),
            to_plan_id: Some(target_plan.id),
            amount_minor: difference_minor,
            currency: self.settings.currency.clone(),
            payment_id: Some(payment_id),
            reason: "User requested upgrade".to_string(),
        })
        .await;

        Ok(CheckoutDto {
            subscription_id,
            payment_id,
            checkout_url: session.checkout_url,
            amount_minor: difference_minor,
            currency: self.settings.currency.clone(),
        })
    }

    /// Schedules a downgrade for the end of the paid period, or applies it at
    /// once when the period has already elapsed.
    pub async fn schedule_downgrade(
        &self,
        actor: &Actor,
        subscription_id: Uuid,
        target_plan_id: Uuid,
    ) -> LifecycleResult<DowngradeOutcome> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        if !actor.owns(subscription.user_id) {
            return Err(LifecycleError::OwnershipMismatch);
        }

        let current_plan = self
            .plan_repo
            .find_active_by_id(subscription.plan_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::InvalidPlan)?;

        let has_lower = self
            .plan_repo
            .exists_active_below_rank(current_plan.tier_rank)
            .await
            .map_err(LifecycleError::Internal)?;
        if !has_lower {
            info!(
                %subscription_id,
                current = %current_plan.shortname,
                "lifecycle: downgrade refused; already on the lowest tier"
            );
            return Err(LifecycleError::NoLowerTier);
        }

        let target_plan = self
            .plan_repo
            .find_active_by_id(target_plan_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::InvalidPlan)?;
        if target_plan.tier_rank >= current_plan.tier_rank {
            return Err(LifecycleError::InvalidPlan);
        }

        if self
            .downgrade_repo
            .find_pending_for_user(subscription.user_id)
            .await
            .map_err(LifecycleError::Internal)?
            .is_some()
        {
            info!(
                user_id = %subscription.user_id,
                "lifecycle: downgrade refused; a request is already pending"
            );
            return Err(LifecycleError::AlreadyScheduled);
        }

        let now = Utc::now();
        if subscription.ends_at <= now {
            // Scheduling only exists to protect a paid-for period; with the
            // period gone, apply the change directly.
            self.apply_immediate_plan_change(&subscription, &target_plan, "Immediate downgrade")
                .await?;

            self.log(InsertSubscriptionLogEntity {
                user_id: subscription.user_id,
                subscription_id: Some(subscription_id),
                action: "downgrade".to_string(),
                from_plan_id: Some(current_plan.id),
                to_plan_id: Some(target_plan.id),
                amount_minor: 0,
                currency: self.settings.currency.clone(),
                payment_id: None,
                reason: "Period already elapsed; applied immediately".to_string(),
            })
            .await;

            return Ok(DowngradeOutcome::AppliedImmediately);
        }

        let request_id = self
            .downgrade_repo
            .insert(domain::entities::downgrade_requests::InsertDowngradeRequestEntity {
                user_id: subscription.user_id,
                current_plan_id: current_plan.id,
                target_plan_id: target_plan.id,
                status: domain::value_objects::enums::downgrade_statuses::DowngradeStatus::Pending
                    .to_string(),
                requested_at: now,
                scheduled_for: subscription.ends_at,
            })
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "lifecycle: failed to insert downgrade request");
                LifecycleError::Internal(err)
            })?;

        self.log(InsertSubscriptionLogEntity {
            user_id: subscription.user_id,
            subscription_id: Some(subscription_id),
            action: "downgrade_scheduled".to_string(),
            from_plan_id: Some(current_plan.id),
            to_plan_id: Some(target_plan.id),
            amount_minor: 0,
            currency: self.settings.currency.clone(),
            payment_id: None,
            reason: "Scheduled for period end".to_string(),
        })
        .await;

        info!(
            %subscription_id,
            %request_id,
            scheduled_for = %subscription.ends_at,
            "lifecycle: downgrade scheduled"
        );

        Ok(DowngradeOutcome::Scheduled {
            request_id,
            scheduled_for: subscription.ends_at,
        })
    }

    /// Cancels a pending downgrade request owned by the caller. Requests in
    /// any other state surface as not found.
    pub async fn cancel_downgrade(&self, actor: &Actor, request_id: Uuid) -> LifecycleResult<()> {
        let request = self
            .downgrade_repo
            .find_pending_owned(request_id, actor.user_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        self.downgrade_repo
            .mark_cancelled(request.id)
            .await
            .map_err(LifecycleError::Internal)?;

        self.log(InsertSubscriptionLogEntity {
            user_id: actor.user_id,
            subscription_id: None,
            action: "cancel_downgrade_request".to_string(),
            from_plan_id: Some(request.current_plan_id),
            to_plan_id: Some(request.target_plan_id),
            amount_minor: 0,
            currency: self.settings.currency.clone(),
            payment_id: None,
            reason: "User cancelled downgrade request".to_string(),
        })
        .await;

        info!(%request_id, "lifecycle: downgrade request cancelled");
        Ok(())
    }

    /// User-facing cancel: turns off auto-renew and lets the paid period run
    /// out. Access is only revoked later, by the expiry sweep.
    pub async fn cancel_at_period_end(
        &self,
        actor: &Actor,
        subscription_id: Uuid,
        reason: &str,
    ) -> LifecycleResult<DateTime<Utc>> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        if !actor.owns(subscription.user_id) {
            return Err(LifecycleError::OwnershipMismatch);
        }
        if SubscriptionStatus::from_str(&subscription.status) != SubscriptionStatus::Active {
            return Err(LifecycleError::NotFound);
        }

        self.subscription_repo
            .set_auto_renew(subscription_id, false)
            .await
            .map_err(LifecycleError::Internal)?;

        self.cancellation_repo
            .insert(InsertCancellationEntity {
                subscription_id,
                user_id: subscription.user_id,
                status: "scheduled".to_string(),
                reason: reason.to_string(),
                cancelled_at: Utc::now(),
            })
            .await
            .map_err(LifecycleError::Internal)?;

        self.log(InsertSubscriptionLogEntity {
            user_id: subscription.user_id,
            subscription_id: Some(subscription_id),
            action: "cancel".to_string(),
            from_plan_id: Some(subscription.plan_id),
            to_plan_id: None,
            amount_minor: 0,
            currency: self.settings.currency.clone(),
            payment_id: None,
            reason: reason.to_string(),
        })
        .await;

        info!(
            %subscription_id,
            access_until = %subscription.ends_at,
            "lifecycle: cancellation scheduled for period end"
        );

        Ok(subscription.ends_at)
    }

    /// Admin-only immediate cancel: flips the row to cancelled and revokes
    /// access on the spot.
    pub async fn cancel_immediate(
        &self,
        actor: &Actor,
        subscription_id: Uuid,
        reason: &str,
    ) -> LifecycleResult<()> {
        if !actor.is_admin() {
            return Err(LifecycleError::OwnershipMismatch);
        }

        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?
            .ok_or(LifecycleError::NotFound)?;

        if SubscriptionStatus::from_str(&subscription.status) != SubscriptionStatus::Active {
            return Err(LifecycleError::NotFound);
        }

        self.subscription_repo
            .mark_cancelled(subscription_id)
            .await
            .map_err(LifecycleError::Internal)?;

        self.cancellation_repo
            .insert(InsertCancellationEntity {
                subscription_id,
                user_id: subscription.user_id,
                status: "cancelled".to_string(),
                reason: reason.to_string(),
                cancelled_at: Utc::now(),
            })
            .await
            .map_err(LifecycleError::Internal)?;

        self.cohort_access
            .reconcile_access(subscription.user_id, None)
            .await
            .map_err(LifecycleError::Internal)?;

        self.log(InsertSubscriptionLogEntity {
            user_id: subscription.user_id,
            subscription_id: Some(subscription_id),
            action: "cancel".to_string(),
            from_plan_id: Some(subscription.plan_id),
            to_plan_id: None,
            amount_minor: 0,
            currency: self.settings.currency.clone(),
            payment_id: None,
            reason: reason.to_string(),
        })
        .await;

        info!(%subscription_id, "lifecycle: subscription cancelled immediately");
        Ok(())
    }

    async fn apply_immediate_plan_change(
        &self,
        subscription: &SubscriptionEntity,
        target: &PlanEntity,
        reason: &str,
    ) -> LifecycleResult<()> {
        self.subscription_repo
            .apply_plan_change(subscription.id, target.id, None)
            .await
            .map_err(LifecycleError::Internal)?;

        self.downgrade_repo
            .delete_pending_for_user(subscription.user_id)
            .await
            .map_err(LifecycleError::Internal)?;

        self.cohort_access
            .reconcile_access(subscription.user_id, Some(target.tier_rank))
            .await
            .map_err(LifecycleError::Internal)?;

        if self.settings.plan_change_audit {
            self.log(InsertSubscriptionLogEntity {
                user_id: subscription.user_id,
                subscription_id: Some(subscription.id),
                action: "plan_change".to_string(),
                from_plan_id: Some(subscription.plan_id),
                to_plan_id: Some(target.id),
                amount_minor: 0,
                currency: self.settings.currency.clone(),
                payment_id: None,
                reason: reason.to_string(),
            })
            .await;
        }

        Ok(())
    }

    async fn send_receipt(
        &self,
        subscription: &SubscriptionEntity,
        plan: Option<&PlanEntity>,
        currency: &str,
        amount_minor: i32,
    ) {
        let replacements = HashMap::from([
            ("plan", plan.map(|p| p.fullname.clone()).unwrap_or_default()),
            ("amount", format_minor_amount(i64::from(amount_minor))),
            ("currency", currency.to_string()),
            ("enddate", subscription.ends_at.format("%Y-%m-%d").to_string()),
            ("site", self.settings.site_name.clone()),
        ]);
        send_templated(
            &self.notifier,
            &self.settings.templates,
            subscription.user_id,
            NotificationKind::Receipt,
            &replacements,
        )
        .await;
    }

    // Audit logging must never veto a billing transition; failures are logged
    // and dropped.
    async fn log(&self, entry: InsertSubscriptionLogEntity) {
        if let Err(err) = self.log_repo.insert(entry).await {
            warn!(db_error = ?err, "lifecycle: failed to write subscription log entry");
        }
    }
}

fn add_months(from: DateTime<Utc>, months: i32) -> LifecycleResult<DateTime<Utc>> {
    from.checked_add_months(Months::new(months as u32))
        .ok_or_else(|| LifecycleError::Internal(anyhow!("failed to compute period end")))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mockall::predicate::eq;

    use domain::entities::payments::PaymentEntity;
    use domain::repositories::{
        cancellations::MockCancellationRepository, cohorts::MockCohortStore,
        downgrade_requests::MockDowngradeRequestRepository, payments::MockPaymentRepository,
        plans::MockPlanRepository, subscription_logs::MockSubscriptionLogRepository,
        subscriptions::MockSubscriptionRepository,
    };
    use domain::value_objects::enums::downgrade_statuses::DowngradeStatus;

    use crate::access_policy::MockAccessPolicy;
    use crate::gateway::{CheckoutSession, MockChapaGateway};
    use crate::notifications::MockNotificationSender;
    use crate::usecases::cohort_access::CohortGroups;

    use super::*;

    struct Mocks {
        plan_repo: MockPlanRepository,
        subscription_repo: MockSubscriptionRepository,
        payment_repo: MockPaymentRepository,
        downgrade_repo: MockDowngradeRequestRepository,
        cancellation_repo: MockCancellationRepository,
        log_repo: MockSubscriptionLogRepository,
        gateway: MockChapaGateway,
        cohort_store: MockCohortStore,
        notifier: MockNotificationSender,
        access_policy: MockAccessPolicy,
        groups: CohortGroups,
    }

    type TestUseCase = SubscriptionLifecycleUseCase<
        MockPlanRepository,
        MockSubscriptionRepository,
        MockPaymentRepository,
        MockDowngradeRequestRepository,
        MockCancellationRepository,
        MockSubscriptionLogRepository,
        MockChapaGateway,
    >;

    impl Mocks {
        fn new() -> Self {
            Self {
                plan_repo: MockPlanRepository::new(),
                subscription_repo: MockSubscriptionRepository::new(),
                payment_repo: MockPaymentRepository::new(),
                downgrade_repo: MockDowngradeRequestRepository::new(),
                cancellation_repo: MockCancellationRepository::new(),
                log_repo: MockSubscriptionLogRepository::new(),
                gateway: MockChapaGateway::new(),
                cohort_store: MockCohortStore::new(),
                notifier: MockNotificationSender::new(),
                access_policy: MockAccessPolicy::new(),
                groups: CohortGroups::default(),
            }
        }

        fn allow_logging(&mut self) {
            self.log_repo
                .expect_insert()
                .returning(|_| Ok(Uuid::new_v4()));
        }

        fn into_usecase(self) -> TestUseCase {
            SubscriptionLifecycleUseCase::new(
                Arc::new(self.plan_repo),
                Arc::new(self.subscription_repo),
                Arc::new(self.payment_repo),
                Arc::new(self.downgrade_repo),
                Arc::new(self.cancellation_repo),
                Arc::new(self.log_repo),
                Arc::new(self.gateway),
                Arc::new(CohortAccessUseCase::new(
                    Arc::new(self.cohort_store),
                    self.groups,
                )),
                Arc::new(self.notifier),
                Arc::new(self.access_policy),
                test_settings(),
            )
        }
    }

    fn test_settings() -> LifecycleSettings {
        LifecycleSettings {
            currency: "ETB".to_string(),
            discounts: DiscountTable::new(10, 15, 25),
            templates: NotificationTemplates {
                receipt: Some("Receipt: {plan} {amount} {currency}".to_string()),
                renewal_reminder: Some("Renewal: {plan} on {enddate}".to_string()),
                renewal_failed: Some("Payment failed for {plan}".to_string()),
                subscription_expired: Some("{plan} expired on {enddate}".to_string()),
            },
            plan_change_audit: false,
            site_name: "Test Academy".to_string(),
        }
    }

    fn make_plan(shortname: &str, tier_rank: i32, monthly_price_minor: i32) -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            shortname: shortname.to_string(),
            fullname: format!("{} Plan", shortname),
            monthly_price_minor,
            tier_rank,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn make_subscription(
        user_id: Uuid,
        plan_id: Uuid,
        status: SubscriptionStatus,
        ends_in_days: i64,
        auto_renew: bool,
    ) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            status: status.to_string(),
            starts_at: now - Duration::days(30),
            ends_at: now + Duration::days(ends_in_days),
            auto_renew,
            cancelled_at: None,
            last_payment_id: None,
            created_at: now - Duration::days(30),
            updated_at: now,
        }
    }

    fn make_payment(
        subscription: &SubscriptionEntity,
        kind: PaymentKind,
        status: PaymentStatus,
        amount_minor: i32,
        target_plan_id: Option<Uuid>,
    ) -> PaymentEntity {
        PaymentEntity {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            subscription_id: subscription.id,
            kind: kind.to_string(),
            amount_minor,
            currency: "ETB".to_string(),
            months: 1,
            discount_percent: 0,
            status: status.to_string(),
            gateway_tx_ref: Some("ref-1".to_string()),
            payment_method: None,
            target_plan_id,
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn contact() -> PurchaserContact {
        PurchaserContact {
            email: "learner@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "Learner".to_string(),
        }
    }

    #[tokio::test]
    async fn create_subscription_quotes_discount_and_opens_checkout() {
        let user_id = Uuid::new_v4();
        let plan = make_plan("standard", 2, 24900);
        let plan_id = plan.id;
        let subscription_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();

        let mut mocks = Mocks::new();
        mocks.allow_logging();
        mocks
            .plan_repo
            .expect_find_active_by_shortname()
            .with(eq("standard"))
            .returning(move |_| Ok(Some(plan.clone())));
        mocks
            .subscription_repo
            .expect_insert()
            .withf(move |entity| {
                entity.plan_id == plan_id && entity.status == "pending" && entity.auto_renew
            })
            .returning(move |_| Ok(subscription_id));
        mocks
            .payment_repo
            .expect_insert()
            .withf(|entity| {
                entity.amount_minor == 67230
                    && entity.months == 3
                    && entity.discount_percent == 10
                    && entity.kind == "initial"
                    && entity.status == "pending"
            })
            .returning(move |_| Ok(payment_id));
        mocks
            .subscription_repo
            .expect_set_last_payment()
            .with(eq(subscription_id), eq(payment_id))
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .gateway
            .expect_initialize_transaction()
            .withf(move |request| {
                request.amount_minor == 67230
                    && request.currency == "ETB"
                    && PaymentReference::decode(&request.tx_ref)
                        .is_some_and(|r| r.subscription_id == subscription_id)
            })
            .returning(|_| {
                Ok(CheckoutSession {
                    checkout_url: "https://checkout.test/session".to_string(),
                    reference: "gw-ref-1".to_string(),
                })
            });
        mocks
            .payment_repo
            .expect_set_gateway_tx_ref()
            .with(eq(payment_id), eq("gw-ref-1"))
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = mocks.into_usecase();
        let checkout = usecase
            .create_subscription(&Actor::learner(user_id), &contact(), "standard", "quarterly")
            .await
            .unwrap();

        assert_eq!(checkout.subscription_id, subscription_id);
        assert_eq!(checkout.payment_id, payment_id);
        assert_eq!(checkout.amount_minor, 67230);
        assert_eq!(checkout.checkout_url, "https://checkout.test/session");
    }

    #[tokio::test]
    async fn create_subscription_rejects_unknown_plan() {
        let mut mocks = Mocks::new();
        mocks
            .plan_repo
            .expect_find_active_by_shortname()
            .returning(|_| Ok(None));

        let usecase = mocks.into_usecase();
        let result = usecase
            .create_subscription(
                &Actor::learner(Uuid::new_v4()),
                &contact(),
                "platinum",
                "monthly",
            )
            .await;

        assert!(matches!(result, Err(LifecycleError::InvalidPlan)));
    }

    #[tokio::test]
    async fn create_subscription_surfaces_gateway_failure_and_stays_pending() {
        let plan = make_plan("basic", 1, 14900);
        let mut mocks = Mocks::new();
        mocks.allow_logging();
        mocks
            .plan_repo
            .expect_find_active_by_shortname()
            .returning(move |_| Ok(Some(plan.clone())));
        mocks
            .subscription_repo
            .expect_insert()
            .returning(|_| Ok(Uuid::new_v4()));
        mocks.payment_repo.expect_insert().returning(|_| Ok(Uuid::new_v4()));
        mocks
            .subscription_repo
            .expect_set_last_payment()
            .returning(|_, _| Ok(()));
        mocks
            .gateway
            .expect_initialize_transaction()
            .returning(|_| Err(anyhow!("HTTP 502 from gateway")));
        // No set_gateway_tx_ref, no status changes: the row stays pending.

        let usecase = mocks.into_usecase();
        let result = usecase
            .create_subscription(&Actor::learner(Uuid::new_v4()), &contact(), "basic", "monthly")
            .await;

        assert!(matches!(result, Err(LifecycleError::Gateway(_))));
    }

    #[tokio::test]
    async fn confirm_payment_is_a_noop_when_already_successful() {
        let user_id = Uuid::new_v4();
        let subscription =
            make_subscription(user_id, Uuid::new_v4(), SubscriptionStatus::Active, 20, true);
        let payment = make_payment(
            &subscription,
            PaymentKind::Initial,
            PaymentStatus::Success,
            67230,
            None,
        );
        let payment_id = payment.id;

        let mut mocks = Mocks::new();
        mocks
            .payment_repo
            .expect_find_by_id()
            .with(eq(payment_id))
            .returning(move |_| Ok(Some(payment.clone())));
        mocks
            .subscription_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(subscription.clone())));
        // No mark_success, no cohort writes, no receipt, no log rows.

        let usecase = mocks.into_usecase();
        let outcome = usecase
            .confirm_payment(payment_id, None, true, Some("gw-ref-1"), None)
            .await
            .unwrap();

        assert_eq!(outcome, PaymentConfirmation::AlreadyConfirmed);
    }

    #[tokio::test]
    async fn confirm_payment_activates_and_grants_hierarchical_access() {
        let user_id = Uuid::new_v4();
        let plan = make_plan("standard", 2, 24900);
        let subscription =
            make_subscription(user_id, plan.id, SubscriptionStatus::Pending, 90, true);
        let subscription_id = subscription.id;
        let payment = make_payment(
            &subscription,
            PaymentKind::Initial,
            PaymentStatus::Pending,
            67230,
            None,
        );
        let payment_id = payment.id;

        let free = Uuid::new_v4();
        let basic = Uuid::new_v4();
        let standard = Uuid::new_v4();
        let premium = Uuid::new_v4();

        let mut mocks = Mocks::new();
        mocks.groups = CohortGroups {
            free_preview: Some(free),
            basic: Some(basic),
            standard: Some(standard),
            premium: Some(premium),
        };
        mocks
            .payment_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(payment.clone())));
        mocks
            .subscription_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(subscription.clone())));
        mocks
            .payment_repo
            .expect_mark_success()
            .withf(move |id, gateway_ref, method| {
                *id == payment_id && *gateway_ref == Some("gw-ref-1") && *method == Some("telebirr")
            })
            .times(1)
            .returning(|_, _, _| Ok(true));
        mocks
            .subscription_repo
            .expect_mark_active()
            .with(eq(subscription_id))
            .times(1)
            .returning(|_| Ok(()));
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .returning(move |_| Ok(Some(plan.clone())));
        for cohort_id in [basic, standard] {
            mocks
                .cohort_store
                .expect_is_member()
                .with(eq(cohort_id), eq(user_id))
                .times(1)
                .returning(|_, _| Ok(false));
            mocks
                .cohort_store
                .expect_add_member()
                .with(eq(cohort_id), eq(user_id))
                .times(1)
                .returning(|_, _| Ok(()));
        }
        for cohort_id in [premium, free] {
            mocks
                .cohort_store
                .expect_remove_member()
                .with(eq(cohort_id), eq(user_id))
                .times(1)
                .returning(|_, _| Ok(()));
        }
        mocks
            .log_repo
            .expect_insert()
            .withf(|entry| entry.action == "payment_confirmed")
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));
        mocks
            .notifier
            .expect_send()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let usecase = mocks.into_usecase();
        let outcome = usecase
            .confirm_payment(payment_id, None, true, Some("gw-ref-1"), Some("telebirr"))
            .await
            .unwrap();

        assert_eq!(outcome, PaymentConfirmation::Confirmed);
    }

    #[tokio::test]
    async fn confirm_payment_failure_cancels_a_pending_initial_subscription() {
        let user_id = Uuid::new_v4();
        let plan = make_plan("basic", 1, 14900);
        let subscription =
            make_subscription(user_id, plan.id, SubscriptionStatus::Pending, 30, true);
        let subscription_id = subscription.id;
        let payment = make_payment(
            &subscription,
            PaymentKind::Initial,
            PaymentStatus::Pending,
            14900,
            None,
        );
        let payment_id = payment.id;

        let mut mocks = Mocks::new();
        mocks
            .payment_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(payment.clone())));
        mocks
            .subscription_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(subscription.clone())));
        mocks
            .payment_repo
            .expect_mark_failed()
            .withf(move |id, error| *id == payment_id && error.is_some())
            .times(1)
            .returning(|_, _| Ok(true));
        mocks
            .subscription_repo
            .expect_mark_cancelled()
            .with(eq(subscription_id))
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
            .withf(|entry| entry.action == "payment_failed")
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));

        let usecase = mocks.into_usecase();
        let outcome = usecase
            .confirm_payment(payment_id, None, false, None, None)
            .await
            .unwrap();

        assert_eq!(outcome, PaymentConfirmation::Failed);
    }

    #[tokio::test]
    async fn confirm_payment_denies_a_non_owner() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let subscription =
            make_subscription(owner, Uuid::new_v4(), SubscriptionStatus::Pending, 30, true);
        let payment = make_payment(
            &subscription,
            PaymentKind::Initial,
            PaymentStatus::Pending,
            14900,
            None,
        );
        let payment_id = payment.id;

        let mut mocks = Mocks::new();
        mocks
            .payment_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(payment.clone())));
        mocks
            .subscription_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(subscription.clone())));

        let usecase = mocks.into_usecase();
        let result = usecase
            .confirm_payment(payment_id, Some(&Actor::learner(stranger)), true, None, None)
            .await;

        assert!(matches!(result, Err(LifecycleError::OwnershipMismatch)));
    }

    #[tokio::test]
    async fn second_downgrade_request_is_rejected_while_one_is_pending() {
        let user_id = Uuid::new_v4();
        let premium = make_plan("premium", 3, 34900);
        let basic = make_plan("basic", 1, 14900);
        let subscription =
            make_subscription(user_id, premium.id, SubscriptionStatus::Active, 20, true);
        let subscription_id = subscription.id;
        let pending = domain::entities::downgrade_requests::DowngradeRequestEntity {
            id: Uuid::new_v4(),
            user_id,
            current_plan_id: premium.id,
            target_plan_id: basic.id,
            status: DowngradeStatus::Pending.to_string(),
            requested_at: Utc::now(),
            scheduled_for: subscription.ends_at,
            executed_at: None,
            cancelled_at: None,
        };

        let mut mocks = Mocks::new();
        mocks
            .subscription_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(subscription.clone())));
        let premium_clone = premium.clone();
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .with(eq(premium.id))
            .returning(move |_| Ok(Some(premium_clone.clone())));
        let basic_clone = basic.clone();
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .with(eq(basic.id))
            .returning(move |_| Ok(Some(basic_clone.clone())));
        mocks
            .plan_repo
            .expect_exists_active_below_rank()
            .with(eq(3))
            .returning(|_| Ok(true));
        mocks
            .downgrade_repo
            .expect_find_pending_for_user()
            .with(eq(user_id))
            .returning(move |_| Ok(Some(pending.clone())));

        let usecase = mocks.into_usecase();
        let result = usecase
            .schedule_downgrade(&Actor::learner(user_id), subscription_id, basic.id)
            .await;

        assert!(matches!(result, Err(LifecycleError::AlreadyScheduled)));
    }

    #[tokio::test]
    async fn downgrade_from_the_lowest_tier_is_rejected() {
        let user_id = Uuid::new_v4();
        let basic = make_plan("basic", 1, 14900);
        let subscription =
            make_subscription(user_id, basic.id, SubscriptionStatus::Active, 20, true);
        let subscription_id = subscription.id;

        let mut mocks = Mocks::new();
        mocks
            .subscription_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(subscription.clone())));
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .returning(move |_| Ok(Some(basic.clone())));
        mocks
            .plan_repo
            .expect_exists_active_below_rank()
            .with(eq(1))
            .returning(|_| Ok(false));

        let usecase = mocks.into_usecase();
        let result = usecase
            .schedule_downgrade(&Actor::learner(user_id), subscription_id, Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(LifecycleError::NoLowerTier)));
    }

    #[tokio::test]
    async fn downgrade_is_scheduled_for_the_period_end() {
        let user_id = Uuid::new_v4();
        let premium = make_plan("premium", 3, 34900);
        let standard = make_plan("standard", 2, 24900);
        let subscription =
            make_subscription(user_id, premium.id, SubscriptionStatus::Active, 20, true);
        let subscription_id = subscription.id;
        let ends_at = subscription.ends_at;
        let request_id = Uuid::new_v4();

        let mut mocks = Mocks::new();
        mocks.allow_logging();
        mocks
            .subscription_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(subscription.clone())));
        let premium_clone = premium.clone();
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .with(eq(premium.id))
            .returning(move |_| Ok(Some(premium_clone.clone())));
        let standard_clone = standard.clone();
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .with(eq(standard.id))
            .returning(move |_| Ok(Some(standard_clone.clone())));
        mocks
            .plan_repo
            .expect_exists_active_below_rank()
            .returning(|_| Ok(true));
        mocks
            .downgrade_repo
            .expect_find_pending_for_user()
            .returning(|_| Ok(None));
        mocks
            .downgrade_repo
            .expect_insert()
            .withf(move |entity| entity.scheduled_for == ends_at && entity.status == "pending")
            .times(1)
            .returning(move |_| Ok(request_id));

        let usecase = mocks.into_usecase();
        let outcome = usecase
            .schedule_downgrade(&Actor::learner(user_id), subscription_id, standard.id)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DowngradeOutcome::Scheduled {
                request_id,
                scheduled_for: ends_at
            }
        );
    }

    #[tokio::test]
    async fn cancelling_a_non_pending_downgrade_request_is_not_found() {
        let user_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks
            .downgrade_repo
            .expect_find_pending_owned()
            .returning(|_, _| Ok(None));

        let usecase = mocks.into_usecase();
        let result = usecase
            .cancel_downgrade(&Actor::learner(user_id), Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(LifecycleError::NotFound)));
    }

    #[tokio::test]
    async fn cancel_at_period_end_keeps_access_and_clears_auto_renew() {
        let user_id = Uuid::new_v4();
        let subscription =
            make_subscription(user_id, Uuid::new_v4(), SubscriptionStatus::Active, 12, true);
        let subscription_id = subscription.id;
        let ends_at = subscription.ends_at;

        let mut mocks = Mocks::new();
        mocks.allow_logging();
        mocks
            .subscription_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(subscription.clone())));
        mocks
            .subscription_repo
            .expect_set_auto_renew()
            .with(eq(subscription_id), eq(false))
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .cancellation_repo
            .expect_insert()
            .withf(|entity| entity.status == "scheduled")
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));
        // No mark_cancelled and no cohort writes: access stays until expiry.

        let usecase = mocks.into_usecase();
        let access_until = usecase
            .cancel_at_period_end(&Actor::learner(user_id), subscription_id, "User cancelled")
            .await
            .unwrap();

        assert_eq!(access_until, ends_at);
    }

    #[tokio::test]
    async fn immediate_cancel_is_admin_only() {
        let mocks = Mocks::new();
        let usecase = mocks.into_usecase();

        let result = usecase
            .cancel_immediate(
                &Actor::learner(Uuid::new_v4()),
                Uuid::new_v4(),
                "no reason",
            )
            .await;

        assert!(matches!(result, Err(LifecycleError::OwnershipMismatch)));
    }

    #[tokio::test]
    async fn purchase_offer_is_hidden_from_staff_accounts() {
        let user_id = Uuid::new_v4();

        let mut mocks = Mocks::new();
        mocks
            .access_policy
            .expect_is_plain_learner()
            .with(eq(user_id))
            .returning(|_| Ok(false));
        mocks
            .subscription_repo
            .expect_find_current_active()
            .returning(|_| Ok(None));
        mocks.plan_repo.expect_list_active().returning(|| Ok(vec![]));

        let usecase = mocks.into_usecase();
        let offer = usecase.purchase_offer(user_id).await.unwrap();

        assert!(!offer.eligible);
        assert!(offer.current.is_none());
    }

    #[tokio::test]
    async fn upgrade_target_must_be_a_higher_tier() {
        let user_id = Uuid::new_v4();
        let standard = make_plan("standard", 2, 24900);
        let basic = make_plan("basic", 1, 14900);
        let subscription =
            make_subscription(user_id, standard.id, SubscriptionStatus::Active, 20, true);
        let subscription_id = subscription.id;

        let mut mocks = Mocks::new();
        mocks
            .subscription_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(subscription.clone())));
        let standard_clone = standard.clone();
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .with(eq(standard.id))
            .returning(move |_| Ok(Some(standard_clone.clone())));
        let basic_clone = basic.clone();
        mocks
            .plan_repo
            .expect_find_active_by_id()
            .with(eq(basic.id))
            .returning(move |_| Ok(Some(basic_clone.clone())));

        let usecase = mocks.into_usecase();
        let result = usecase
            .request_upgrade(
                &Actor::learner(user_id),
                &contact(),
                subscription_id,
                basic.id,
            )
            .await;

        assert!(matches!(result, Err(LifecycleError::InvalidPlan)));
    }
}
