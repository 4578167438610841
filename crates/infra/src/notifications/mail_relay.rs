use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use application::notifications::NotificationSender;

/// Hands rendered messages to the host system's outbound mail relay, which
/// owns the user record, resolves the address, and substitutes the
/// user-profile placeholders.
pub struct MailRelayNotifier {
    relay_url: Url,
    token: String,
    client: Client,
}

impl MailRelayNotifier {
    pub fn new(relay_url: Url, token: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("reqwest client must build");

        Self {
            relay_url,
            token,
            client,
        }
    }
}

#[async_trait]
impl NotificationSender for MailRelayNotifier {
    async fn send(&self, user_id: Uuid, subject: &str, body: &str) -> Result<()> {
        let payload = json!({
            "user_id": user_id,
            "subject": subject,
            "body": body,
        });

        let resp = self
            .client
            .post(self.relay_url.clone())
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("mail relay returned status {}", resp.status()));
        }

        Ok(())
    }
}
