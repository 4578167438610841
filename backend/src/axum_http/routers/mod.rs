pub mod admin_subscriptions;
pub mod payments;
pub mod subscriptions;

use std::sync::Arc;

use application::usecases::{
    cohort_access::CohortAccessUseCase, payment_reconciliation::PaymentReconciliationUseCase,
    subscription_lifecycle::SubscriptionLifecycleUseCase,
};
use infra::{
    chapa::client::ChapaClient,
    lms::access_policy::StaffListAccessPolicy,
    notifications::build_notifier,
    postgres::{
        postgres_connection::PgPoolSquad,
        repositories::{
            cancellations::CancellationPostgres, cohorts::CohortPostgres,
            downgrade_requests::DowngradeRequestPostgres, payments::PaymentPostgres,
            plans::PlanPostgres, subscription_logs::SubscriptionLogPostgres,
            subscriptions::SubscriptionPostgres,
        },
    },
};

use crate::config::config_model::DotEnvyConfig;

pub type LifecycleService = SubscriptionLifecycleUseCase<
    PlanPostgres,
    SubscriptionPostgres,
    PaymentPostgres,
    DowngradeRequestPostgres,
    CancellationPostgres,
    SubscriptionLogPostgres,
    ChapaClient,
>;

pub type ReconciliationService = PaymentReconciliationUseCase<
    PlanPostgres,
    SubscriptionPostgres,
    PaymentPostgres,
    DowngradeRequestPostgres,
    CancellationPostgres,
    SubscriptionLogPostgres,
    ChapaClient,
>;

pub fn build_lifecycle(
    db_pool: &Arc<PgPoolSquad>,
    config: &Arc<DotEnvyConfig>,
) -> Arc<LifecycleService> {
    let gateway = Arc::new(ChapaClient::new(
        config.chapa.secret_key.clone(),
        config.chapa.webhook_secret.clone(),
        config.chapa.base_url.clone(),
        config.chapa.callback_url.clone(),
        config.chapa.return_url.clone(),
    ));

    let cohort_access = Arc::new(CohortAccessUseCase::new(
        Arc::new(CohortPostgres::new(Arc::clone(db_pool))),
        config.cohort_groups(),
    ));

    let notifier = build_notifier(config.mail_relay.url.clone(), config.mail_relay.token.clone())
        .expect("mail relay URL must be valid");

    Arc::new(SubscriptionLifecycleUseCase::new(
        Arc::new(PlanPostgres::new(Arc::clone(db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(db_pool))),
        Arc::new(PaymentPostgres::new(Arc::clone(db_pool))),
        Arc::new(DowngradeRequestPostgres::new(Arc::clone(db_pool))),
        Arc::new(CancellationPostgres::new(Arc::clone(db_pool))),
        Arc::new(SubscriptionLogPostgres::new(Arc::clone(db_pool))),
        gateway,
        cohort_access,
        notifier,
        Arc::new(StaffListAccessPolicy::new(config.lms.staff_user_ids.clone())),
        config.lifecycle_settings(),
    ))
}

pub fn build_reconciliation(
    db_pool: &Arc<PgPoolSquad>,
    config: &Arc<DotEnvyConfig>,
) -> Arc<ReconciliationService> {
    let lifecycle = build_lifecycle(db_pool, config);
    let gateway = Arc::new(ChapaClient::new(
        config.chapa.secret_key.clone(),
        config.chapa.webhook_secret.clone(),
        config.chapa.base_url.clone(),
        config.chapa.callback_url.clone(),
        config.chapa.return_url.clone(),
    ));

    Arc::new(PaymentReconciliationUseCase::new(
        lifecycle,
        Arc::new(SubscriptionPostgres::new(Arc::clone(db_pool))),
        Arc::new(PaymentPostgres::new(Arc::clone(db_pool))),
        gateway,
    ))
}
