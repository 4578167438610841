pub mod mail_relay;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use application::notifications::NotificationSender;

use mail_relay::MailRelayNotifier;

/// Wires the configured delivery path, or a logged no-op when no relay is
/// configured (notifications are always best-effort).
pub fn build_notifier(
    relay_url: Option<String>,
    relay_token: Option<String>,
) -> Result<Arc<dyn NotificationSender>> {
    match relay_url {
        Some(url) => {
            let url = Url::parse(&url)?;
            Ok(Arc::new(MailRelayNotifier::new(
                url,
                relay_token.unwrap_or_default(),
            )))
        }
        None => Ok(Arc::new(DisabledNotifier)),
    }
}

struct DisabledNotifier;

#[async_trait]
impl NotificationSender for DisabledNotifier {
    async fn send(&self, user_id: Uuid, subject: &str, _body: &str) -> Result<()> {
        debug!(%user_id, subject, "notifications: no relay configured; dropping message");
        Ok(())
    }
}
