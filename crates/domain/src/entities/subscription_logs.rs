use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::subscription_logs;

// Append-only audit trail. Rows are inserted by the lifecycle engine and never updated.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscription_logs)]
pub struct SubscriptionLogEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub action: String,
    pub from_plan_id: Option<Uuid>,
    pub to_plan_id: Option<Uuid>,
    pub amount_minor: i32,
    pub currency: String,
    pub payment_id: Option<Uuid>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscription_logs)]
pub struct InsertSubscriptionLogEntity {
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub action: String,
    pub from_plan_id: Option<Uuid>,
    pub to_plan_id: Option<Uuid>,
    pub amount_minor: i32,
    pub currency: String,
    pub payment_id: Option<Uuid>,
    pub reason: String,
}
