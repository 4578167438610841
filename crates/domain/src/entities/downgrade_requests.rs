use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::downgrade_requests;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = downgrade_requests)]
pub struct DowngradeRequestEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_plan_id: Uuid,
    pub target_plan_id: Uuid,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = downgrade_requests)]
pub struct InsertDowngradeRequestEntity {
    pub user_id: Uuid,
    pub current_plan_id: Uuid,
    pub target_plan_id: Uuid,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
}
