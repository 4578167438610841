use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::payments;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub kind: String,
    pub amount_minor: i32,
    pub currency: String,
    pub months: i32,
    pub discount_percent: i32,
    pub status: String,
    pub gateway_tx_ref: Option<String>,
    pub payment_method: Option<String>,
    pub target_plan_id: Option<Uuid>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub kind: String,
    pub amount_minor: i32,
    pub currency: String,
    pub months: i32,
    pub discount_percent: i32,
    pub status: String,
    pub gateway_tx_ref: Option<String>,
    pub payment_method: Option<String>,
    pub target_plan_id: Option<Uuid>,
    pub error: Option<String>,
}

// NewPaymentEntity is the application-facing alias for inserting rows into `payments`.
pub type NewPaymentEntity = InsertPaymentEntity;
