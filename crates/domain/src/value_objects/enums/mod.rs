pub mod downgrade_statuses;
pub mod payment_kinds;
pub mod payment_statuses;
pub mod subscription_statuses;
