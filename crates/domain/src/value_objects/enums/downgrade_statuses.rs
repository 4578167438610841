use std::fmt::Display;

use serde::{Deserialize, Serialize};

// Requests only ever move pending -> executed or pending -> cancelled.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum DowngradeStatus {
    #[default]
    Pending,
    Executed,
    Cancelled,
}

impl Display for DowngradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            DowngradeStatus::Pending => "pending",
            DowngradeStatus::Executed => "executed",
            DowngradeStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", status)
    }
}

impl DowngradeStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "pending" => DowngradeStatus::Pending,
            "executed" => DowngradeStatus::Executed,
            "cancelled" => DowngradeStatus::Cancelled,
            _ => DowngradeStatus::Cancelled,
        }
    }
}
