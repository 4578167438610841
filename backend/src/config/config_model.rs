use uuid::Uuid;

use application::notifications::NotificationTemplates;
use application::usecases::cohort_access::CohortGroups;
use application::usecases::renewal_reminders::ReminderPolicy;
use application::usecases::subscription_lifecycle::LifecycleSettings;
use domain::value_objects::pricing::DiscountTable;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: Auth,
    pub chapa: Chapa,
    pub billing: Billing,
    pub cohorts: Cohorts,
    pub templates: Templates,
    pub features: Features,
    pub mail_relay: MailRelay,
    pub lms: Lms,
    pub sweeps: Sweeps,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Chapa {
    pub secret_key: String,
    pub webhook_secret: String,
    pub base_url: String,
    pub callback_url: String,
    pub return_url: String,
}

#[derive(Debug, Clone)]
pub struct Billing {
    pub currency: String,
    pub discount_3_months: i32,
    pub discount_6_months: i32,
    pub discount_12_months: i32,
}

#[derive(Debug, Clone)]
pub struct Cohorts {
    pub free_preview: Option<Uuid>,
    pub basic: Option<Uuid>,
    pub standard: Option<Uuid>,
    pub premium: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct Templates {
    pub receipt: Option<String>,
    pub renewal_reminder: Option<String>,
    pub renewal_failed: Option<String>,
    pub subscription_expired: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Features {
    pub plan_change_audit: bool,
}

#[derive(Debug, Clone)]
pub struct MailRelay {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Lms {
    pub site_name: String,
    pub staff_user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct Sweeps {
    pub interval_secs: u64,
    pub reminder_lookahead_days: i64,
    pub reminder_tolerance_secs: i64,
}

impl DotEnvyConfig {
    pub fn discount_table(&self) -> DiscountTable {
        DiscountTable::new(
            self.billing.discount_3_months,
            self.billing.discount_6_months,
            self.billing.discount_12_months,
        )
    }

    pub fn cohort_groups(&self) -> CohortGroups {
        CohortGroups {
            free_preview: self.cohorts.free_preview,
            basic: self.cohorts.basic,
            standard: self.cohorts.standard,
            premium: self.cohorts.premium,
        }
    }

    pub fn notification_templates(&self) -> NotificationTemplates {
        NotificationTemplates {
            receipt: self.templates.receipt.clone(),
            renewal_reminder: self.templates.renewal_reminder.clone(),
            renewal_failed: self.templates.renewal_failed.clone(),
            subscription_expired: self.templates.subscription_expired.clone(),
        }
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            currency: self.billing.currency.clone(),
            discounts: self.discount_table(),
            templates: self.notification_templates(),
            plan_change_audit: self.features.plan_change_audit,
            site_name: self.lms.site_name.clone(),
        }
    }

    pub fn reminder_policy(&self) -> ReminderPolicy {
        ReminderPolicy {
            lookahead_days: self.sweeps.reminder_lookahead_days,
            tolerance_secs: self.sweeps.reminder_tolerance_secs,
        }
    }
}
