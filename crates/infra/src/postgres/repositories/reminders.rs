use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::reminders::InsertReminderEntity, repositories::reminders::ReminderRepository,
    schema::reminders,
};

pub struct ReminderPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ReminderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ReminderRepository for ReminderPostgres {
    async fn exists(&self, subscription_id: Uuid, reminder_type: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let existing = reminders::table
            .filter(reminders::subscription_id.eq(subscription_id))
            .filter(reminders::reminder_type.eq(reminder_type))
            .select(reminders::id)
            .first::<Uuid>(&mut conn)
            .optional()?;

        Ok(existing.is_some())
    }

    async fn insert(&self, insert_reminder_entity: InsertReminderEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(reminders::table)
            .values(&insert_reminder_entity)
            .returning(reminders::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }
}
