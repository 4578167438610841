use anyhow::Result;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::error;

use application::gateway::{
    ChapaGateway, CheckoutSession, GatewayTransactionStatus, InitializeTransaction,
    VerifiedTransaction,
};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_BASE_URL: &str = "https://api.chapa.co/v1";

/// Minimal Chapa client built on reqwest.
pub struct ChapaClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    base_url: String,
    callback_url: String,
    return_url: String,
}

#[derive(Debug, Deserialize)]
struct ChapaEnvelope {
    status: Option<String>,
    message: Option<String>,
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChapaCheckoutData {
    checkout_url: Option<String>,
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChapaVerifyData {
    status: Option<String>,
    reference: Option<String>,
    payment_method: Option<String>,
}

impl ChapaClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        base_url: String,
        callback_url: String,
        return_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            base_url,
            callback_url,
            return_url,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        error!(
            status = %status,
            response_body = %body,
            context = %context,
            "chapa api request failed"
        );

        anyhow::bail!("Chapa API request failed: {} (status {})", context, status);
    }

    // Chapa expects amounts in major units.
    fn major_units(amount_minor: i64) -> String {
        format!("{}.{:02}", amount_minor / 100, (amount_minor % 100).abs())
    }
}

#[async_trait]
impl ChapaGateway for ChapaClient {
    /// Starts a hosted checkout. https://developer.chapa.co/docs/accept-payments
    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<CheckoutSession> {
        let body = json!({
            "amount": Self::major_units(request.amount_minor),
            "currency": request.currency,
            "email": request.email,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "tx_ref": request.tx_ref,
            "callback_url": self.callback_url,
            "return_url": self.return_url,
            "customization": {
                "description": request.description,
            },
        });

        let resp = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "initialize transaction").await?;

        let envelope: ChapaEnvelope = resp.json().await?;
        if envelope.status.as_deref() != Some("success") {
            anyhow::bail!(
                "Chapa initialize rejected: {}",
                envelope.message.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        let data: ChapaCheckoutData = envelope
            .data
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or(ChapaCheckoutData {
                checkout_url: None,
                reference: None,
            });

        let checkout_url = data
            .checkout_url
            .ok_or_else(|| anyhow::anyhow!("Chapa checkout URL is missing"))?;

        Ok(CheckoutSession {
            checkout_url,
            reference: data.reference.unwrap_or(request.tx_ref),
        })
    }

    /// Looks a transaction up by reference.
    /// https://developer.chapa.co/docs/verify-payments
    async fn verify_transaction(&self, tx_ref: &str) -> Result<VerifiedTransaction> {
        let resp = self
            .http
            .get(format!("{}/transaction/verify/{}", self.base_url, tx_ref))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "verify transaction").await?;

        let envelope: ChapaEnvelope = resp.json().await?;
        let data: ChapaVerifyData = envelope
            .data
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or(ChapaVerifyData {
                status: None,
                reference: None,
                payment_method: None,
            });

        // The transaction is settled only when both the envelope and the
        // transaction itself report success.
        let status = if envelope.status.as_deref() == Some("success") {
            GatewayTransactionStatus::from_str(data.status.as_deref().unwrap_or(""))
        } else {
            GatewayTransactionStatus::Pending
        };

        Ok(VerifiedTransaction {
            status,
            reference: data.reference.unwrap_or_else(|| tx_ref.to_string()),
            payment_method: data.payment_method,
        })
    }

    /// Verifies the HMAC-SHA256 signature Chapa sends over the raw body.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<()> {
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(payload);

        let provided = hex::decode(signature.trim())?;
        mac.verify_slice(&provided)
            .map_err(|_| anyhow::anyhow!("invalid webhook signature"))?;

        Ok(())
    }
}
