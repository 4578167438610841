use std::fmt::Display;

use uuid::Uuid;

const TX_REF_PREFIX: &str = "cpsub";

/// Transaction reference handed to the payment gateway. The wire format is the
/// flat string `cpsub_<subscription-id>_<nonce>` for gateway compatibility,
/// but callers on our side only ever see the parsed form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentReference {
    pub subscription_id: Uuid,
    pub nonce: i64,
}

impl PaymentReference {
    pub fn new(subscription_id: Uuid, nonce: i64) -> Self {
        Self {
            subscription_id,
            nonce,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}_{}_{}",
            TX_REF_PREFIX,
            self.subscription_id.simple(),
            self.nonce
        )
    }

    /// Parses a wire reference. Returns None for anything that is not exactly
    /// prefix, subscription id, and numeric nonce; webhook processing treats
    /// that as an unroutable delivery, not an error.
    pub fn decode(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(TX_REF_PREFIX)?.strip_prefix('_')?;
        let (id_part, nonce_part) = rest.rsplit_once('_')?;

        let subscription_id = Uuid::parse_str(id_part).ok()?;
        let nonce = nonce_part.parse::<i64>().ok()?;

        Some(Self {
            subscription_id,
            nonce,
        })
    }
}

impl Display for PaymentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}
