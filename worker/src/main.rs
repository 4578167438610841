mod services;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use application::usecases::{
    cohort_access::CohortAccessUseCase, expiry_sweep::ExpirySweepUseCase,
    renewal_reminders::RenewalReminderUseCase,
};
use backend::config::config_loader;
use infra::{
    notifications::build_notifier,
    postgres::{
        postgres_connection,
        repositories::{
            cohorts::CohortPostgres, downgrade_requests::DowngradeRequestPostgres,
            plans::PlanPostgres, reminders::ReminderPostgres,
            subscription_logs::SubscriptionLogPostgres, subscriptions::SubscriptionPostgres,
        },
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = config_loader::load()?;
    info!("ENV has been loaded");

    let db_pool = Arc::new(postgres_connection::establish_connection(
        &config.database.url,
    )?);
    info!("Postgres connection has been established");

    let cohort_access = Arc::new(CohortAccessUseCase::new(
        Arc::new(CohortPostgres::new(Arc::clone(&db_pool))),
        config.cohort_groups(),
    ));
    let notifier = build_notifier(config.mail_relay.url.clone(), config.mail_relay.token.clone())?;

    let expiry_sweep = Arc::new(ExpirySweepUseCase::new(
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(DowngradeRequestPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionLogPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&cohort_access),
        Arc::clone(&notifier),
        config.notification_templates(),
        config.billing.currency.clone(),
        config.lms.site_name.clone(),
    ));

    let renewal_reminders = Arc::new(RenewalReminderUseCase::new(
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(ReminderPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&notifier),
        config.notification_templates(),
        config.reminder_policy(),
        config.billing.currency.clone(),
        config.lms.site_name.clone(),
    ));

    services::sweep_loop::run_sweep_loop(
        expiry_sweep,
        renewal_reminders,
        Duration::from_secs(config.sweeps.interval_secs),
    )
    .await
}
