use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::plans::PlanEntity, repositories::plans::PlanRepository, schema::plans,
};

pub struct PlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PlanRepository for PlanPostgres {
    async fn find_active_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = plans::table
            .filter(plans::id.eq(plan_id))
            .filter(plans::is_active.eq(true))
            .select(PlanEntity::as_select())
            .first::<PlanEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_active_by_shortname(&self, shortname: &str) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = plans::table
            .filter(plans::shortname.eq(shortname))
            .filter(plans::is_active.eq(true))
            .select(PlanEntity::as_select())
            .first::<PlanEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_active(&self) -> Result<Vec<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = plans::table
            .filter(plans::is_active.eq(true))
            .order(plans::tier_rank.asc())
            .select(PlanEntity::as_select())
            .load::<PlanEntity>(&mut conn)?;

        Ok(results)
    }

    async fn exists_active_below_rank(&self, tier_rank: i32) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let lower_plan = plans::table
            .filter(plans::is_active.eq(true))
            .filter(plans::tier_rank.lt(tier_rank))
            .select(plans::id)
            .first::<Uuid>(&mut conn)
            .optional()?;

        Ok(lower_plan.is_some())
    }
}
