use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::reminders;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = reminders)]
pub struct ReminderEntity {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub reminder_type: String,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reminders)]
pub struct InsertReminderEntity {
    pub subscription_id: Uuid,
    pub reminder_type: String,
    pub sent_at: DateTime<Utc>,
}
