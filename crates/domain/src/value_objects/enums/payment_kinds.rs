use std::fmt::Display;

use serde::{Deserialize, Serialize};

// Initial charges open a new billing period; upgrade charges cover the rate
// difference when moving to a higher tier mid-period.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum PaymentKind {
    #[default]
    Initial,
    Upgrade,
}

impl Display for PaymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            PaymentKind::Initial => "initial",
            PaymentKind::Upgrade => "upgrade",
        };
        write!(f, "{}", kind)
    }
}

impl PaymentKind {
    pub fn from_str(value: &str) -> Self {
        match value {
            "initial" => PaymentKind::Initial,
            "upgrade" => PaymentKind::Upgrade,
            _ => PaymentKind::Initial,
        }
    }
}
