pub mod cohort_access;
pub mod expiry_sweep;
pub mod payment_reconciliation;
pub mod renewal_reminders;
pub mod subscription_lifecycle;
