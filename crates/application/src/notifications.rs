use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Receipt,
    RenewalReminder,
    RenewalFailed,
    SubscriptionExpired,
}

impl NotificationKind {
    pub fn subject(&self) -> &'static str {
        match self {
            NotificationKind::Receipt => "Payment receipt",
            NotificationKind::RenewalReminder => "Your subscription renews soon",
            NotificationKind::RenewalFailed => "Subscription payment failed",
            NotificationKind::SubscriptionExpired => "Your subscription has expired",
        }
    }
}

/// Message bodies come from admin configuration. A missing template disables
/// that notification; nothing here ever fails an operation.
#[derive(Debug, Clone, Default)]
pub struct NotificationTemplates {
    pub receipt: Option<String>,
    pub renewal_reminder: Option<String>,
    pub renewal_failed: Option<String>,
    pub subscription_expired: Option<String>,
}

impl NotificationTemplates {
    pub fn body_for(&self, kind: NotificationKind) -> Option<&str> {
        match kind {
            NotificationKind::Receipt => self.receipt.as_deref(),
            NotificationKind::RenewalReminder => self.renewal_reminder.as_deref(),
            NotificationKind::RenewalFailed => self.renewal_failed.as_deref(),
            NotificationKind::SubscriptionExpired => self.subscription_expired.as_deref(),
        }
    }
}

/// Plain `{placeholder}` substitution. The engine fills billing placeholders
/// ({plan}, {amount}, {currency}, {enddate}, {site}); user-profile
/// placeholders such as {firstname} are left for the delivery collaborator,
/// which owns the user record.
pub fn render_template(template: &str, replacements: &HashMap<&'static str, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in replacements {
        rendered = rendered.replace(&format!("{{{}}}", key), value);
    }
    rendered
}

/// Formats minor currency units for the {amount} placeholder, e.g. 67230 ->
/// "672.30".
pub fn format_minor_amount(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, (amount_minor % 100).abs())
}

/// Outbound delivery seam; the host system renders the envelope and resolves
/// the recipient address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, user_id: Uuid, subject: &str, body: &str) -> Result<()>;
}

/// Renders and sends one notification. Failures are logged and swallowed so a
/// flaky mail path never rolls back a billing transition.
pub async fn send_templated(
    notifier: &Arc<dyn NotificationSender>,
    templates: &NotificationTemplates,
    user_id: Uuid,
    kind: NotificationKind,
    replacements: &HashMap<&'static str, String>,
) -> bool {
    let Some(template) = templates.body_for(kind) else {
        debug!(%user_id, kind = ?kind, "notifications: no template configured; skipping");
        return false;
    };

    let body = render_template(template, replacements);
    match notifier.send(user_id, kind.subject(), &body).await {
        Ok(()) => true,
        Err(err) => {
            warn!(%user_id, kind = ?kind, error = ?err, "notifications: delivery failed");
            false
        }
    }
}
