use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::plans::PlanEntity;
use crate::value_objects::enums::subscription_statuses::SubscriptionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDto {
    pub id: Uuid,
    pub shortname: String,
    pub fullname: String,
    pub monthly_price_minor: i32,
    pub tier_rank: i32,
}

impl From<PlanEntity> for PlanDto {
    fn from(plan: PlanEntity) -> Self {
        Self {
            id: plan.id,
            shortname: plan.shortname,
            fullname: plan.fullname,
            monthly_price_minor: plan.monthly_price_minor,
            tier_rank: plan.tier_rank,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentSubscriptionDto {
    pub subscription_id: Uuid,
    pub plan: PlanDto,
    pub status: SubscriptionStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub auto_renew: bool,
    pub pending_downgrade_to: Option<Uuid>,
}

/// Returned by the purchase and upgrade flows; the caller forwards the
/// checkout URL to the browser and keeps the ids for the return page.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutDto {
    pub subscription_id: Uuid,
    pub payment_id: Uuid,
    pub checkout_url: String,
    pub amount_minor: i32,
    pub currency: String,
}

/// What the purchase UI should show a user: nothing at all for staff
/// accounts, otherwise the plan catalogue next to their current subscription.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOfferDto {
    pub eligible: bool,
    pub current: Option<CurrentSubscriptionDto>,
    pub plans: Vec<PlanDto>,
}

/// Contact fields forwarded to the payment gateway when initializing
/// a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaserContact {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}
