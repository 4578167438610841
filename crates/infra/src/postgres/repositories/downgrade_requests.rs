use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, delete, prelude::*, update};
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::downgrade_requests::{DowngradeRequestEntity, InsertDowngradeRequestEntity},
    repositories::downgrade_requests::DowngradeRequestRepository,
    schema::downgrade_requests,
    value_objects::enums::downgrade_statuses::DowngradeStatus,
};

pub struct DowngradeRequestPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl DowngradeRequestPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl DowngradeRequestRepository for DowngradeRequestPostgres {
    async fn insert(&self, insert_entity: InsertDowngradeRequestEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(downgrade_requests::table)
            .values(&insert_entity)
            .returning(downgrade_requests::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn find_pending_for_user(&self, user_id: Uuid) -> Result<Option<DowngradeRequestEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = downgrade_requests::table
            .filter(downgrade_requests::user_id.eq(user_id))
            .filter(downgrade_requests::status.eq(DowngradeStatus::Pending.to_string()))
            .select(DowngradeRequestEntity::as_select())
            .first::<DowngradeRequestEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_pending_owned(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DowngradeRequestEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = downgrade_requests::table
            .filter(downgrade_requests::id.eq(request_id))
            .filter(downgrade_requests::user_id.eq(user_id))
            .filter(downgrade_requests::status.eq(DowngradeStatus::Pending.to_string()))
            .select(DowngradeRequestEntity::as_select())
            .first::<DowngradeRequestEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_matching_pending(
        &self,
        user_id: Uuid,
        current_plan_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> Result<Option<DowngradeRequestEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = downgrade_requests::table
            .filter(downgrade_requests::user_id.eq(user_id))
            .filter(downgrade_requests::current_plan_id.eq(current_plan_id))
            .filter(downgrade_requests::scheduled_for.eq(scheduled_for))
            .filter(downgrade_requests::status.eq(DowngradeStatus::Pending.to_string()))
            .select(DowngradeRequestEntity::as_select())
            .first::<DowngradeRequestEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn mark_executed(&self, request_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(downgrade_requests::table)
            .filter(downgrade_requests::id.eq(request_id))
            .filter(downgrade_requests::status.eq(DowngradeStatus::Pending.to_string()))
            .set((
                downgrade_requests::status.eq(DowngradeStatus::Executed.to_string()),
                downgrade_requests::executed_at.eq(Some(Utc::now())),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_cancelled(&self, request_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(downgrade_requests::table)
            .filter(downgrade_requests::id.eq(request_id))
            .filter(downgrade_requests::status.eq(DowngradeStatus::Pending.to_string()))
            .set((
                downgrade_requests::status.eq(DowngradeStatus::Cancelled.to_string()),
                downgrade_requests::cancelled_at.eq(Some(Utc::now())),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn delete_pending_for_user(&self, user_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(downgrade_requests::table)
            .filter(downgrade_requests::user_id.eq(user_id))
            .filter(downgrade_requests::status.eq(DowngradeStatus::Pending.to_string()))
            .execute(&mut conn)?;

        Ok(())
    }
}
