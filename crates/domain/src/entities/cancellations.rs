use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::cancellations;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = cancellations)]
pub struct CancellationEntity {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = cancellations)]
pub struct InsertCancellationEntity {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}
