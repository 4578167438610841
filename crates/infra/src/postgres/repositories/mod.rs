pub mod cancellations;
pub mod cohorts;
pub mod downgrade_requests;
pub mod payments;
pub mod plans;
pub mod reminders;
pub mod subscription_logs;
pub mod subscriptions;
