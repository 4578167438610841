use anyhow::Result;
use async_trait::async_trait;

/// Transaction outcome as reported by the gateway's verify endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GatewayTransactionStatus {
    Success,
    Failed,
    Pending,
}

impl GatewayTransactionStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "success" => GatewayTransactionStatus::Success,
            "failed" => GatewayTransactionStatus::Failed,
            _ => GatewayTransactionStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitializeTransaction {
    pub amount_minor: i64,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tx_ref: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    pub status: GatewayTransactionStatus,
    pub reference: String,
    pub payment_method: Option<String>,
}

/// The payment gateway as the engine sees it. The HTTP client lives in infra;
/// tests swap in a mock. The gateway call always happens before any local
/// state is marked paid, never inside it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChapaGateway: Send + Sync {
    /// Starts a hosted checkout and returns the URL to redirect the payer to.
    async fn initialize_transaction(&self, request: InitializeTransaction)
    -> Result<CheckoutSession>;

    /// Looks a transaction up by reference, used by the return-URL flow when
    /// the webhook has not arrived yet.
    async fn verify_transaction(&self, tx_ref: &str) -> Result<VerifiedTransaction>;

    /// HMAC-SHA256 over the raw webhook body with the shared secret.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<()>;
}
