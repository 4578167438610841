use anyhow::Result;
use uuid::Uuid;

use super::config_model::{
    Auth, BackendServer, Billing, Chapa, Cohorts, Database, DotEnvyConfig, Features, Lms,
    MailRelay, Sweeps, Templates,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: std::env::var("SERVER_PORT_BACKEND")
            .expect("SERVER_PORT_BACKEND is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let auth = Auth {
        jwt_secret: std::env::var("JWT_AUTH_SECRET").expect("JWT_AUTH_SECRET is invalid"),
    };

    let chapa = Chapa {
        secret_key: std::env::var("CHAPA_SECRET_KEY").expect("CHAPA_SECRET_KEY is invalid"),
        webhook_secret: std::env::var("CHAPA_WEBHOOK_SECRET")
            .expect("CHAPA_WEBHOOK_SECRET is invalid"),
        base_url: std::env::var("CHAPA_BASE_URL")
            .unwrap_or_else(|_| infra::chapa::client::DEFAULT_BASE_URL.to_string()),
        callback_url: std::env::var("CHAPA_CALLBACK_URL").expect("CHAPA_CALLBACK_URL is invalid"),
        return_url: std::env::var("CHAPA_RETURN_URL").expect("CHAPA_RETURN_URL is invalid"),
    };

    let billing = Billing {
        currency: std::env::var("BILLING_CURRENCY").unwrap_or_else(|_| "ETB".to_string()),
        discount_3_months: int_or_default("DISCOUNT_3_MONTHS", 0),
        discount_6_months: int_or_default("DISCOUNT_6_MONTHS", 0),
        discount_12_months: int_or_default("DISCOUNT_12_MONTHS", 0),
    };

    let cohorts = Cohorts {
        free_preview: optional_uuid("COHORT_FREE_PREVIEW"),
        basic: optional_uuid("COHORT_BASIC"),
        standard: optional_uuid("COHORT_STANDARD"),
        premium: optional_uuid("COHORT_PREMIUM"),
    };

    let templates = Templates {
        receipt: optional_string("TEMPLATE_RECEIPT"),
        renewal_reminder: optional_string("TEMPLATE_RENEWAL_REMINDER"),
        renewal_failed: optional_string("TEMPLATE_RENEWAL_FAILED"),
        subscription_expired: optional_string("TEMPLATE_SUBSCRIPTION_EXPIRED"),
    };

    let features = Features {
        plan_change_audit: std::env::var("PLAN_CHANGE_AUDIT")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    };

    let mail_relay = MailRelay {
        url: optional_string("MAIL_RELAY_URL"),
        token: optional_string("MAIL_RELAY_TOKEN"),
    };

    let lms = Lms {
        site_name: std::env::var("SITE_NAME").unwrap_or_else(|_| "LucyBridge Academy".to_string()),
        staff_user_ids: std::env::var("STAFF_USER_IDS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
            .collect(),
    };

    let sweeps = Sweeps {
        interval_secs: int_or_default("SWEEP_INTERVAL_SECS", 3600) as u64,
        reminder_lookahead_days: i64::from(int_or_default("RENEWAL_REMINDER_LOOKAHEAD_DAYS", 7)),
        reminder_tolerance_secs: i64::from(int_or_default("RENEWAL_REMINDER_TOLERANCE_SECS", 3600)),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth,
        chapa,
        billing,
        cohorts,
        templates,
        features,
        mail_relay,
        lms,
        sweeps,
    })
}

pub fn get_auth_secret() -> Result<String> {
    dotenvy::dotenv().ok();

    Ok(std::env::var("JWT_AUTH_SECRET").expect("JWT_AUTH_SECRET is invalid"))
}

fn int_or_default(name: &str, default: i32) -> i32 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn optional_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn optional_uuid(name: &str) -> Option<Uuid> {
    std::env::var(name)
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
}
