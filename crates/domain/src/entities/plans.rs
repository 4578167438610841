use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::plans;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanEntity {
    pub id: Uuid,
    pub shortname: String,
    pub fullname: String,
    pub monthly_price_minor: i32,
    pub tier_rank: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = plans)]
pub struct InsertPlanEntity {
    pub shortname: String,
    pub fullname: String,
    pub monthly_price_minor: i32,
    pub tier_rank: i32,
    pub is_active: bool,
}
