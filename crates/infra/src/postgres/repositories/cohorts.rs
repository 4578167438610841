use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, delete, prelude::*};
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::cohort_members::InsertCohortMemberEntity, repositories::cohorts::CohortStore,
    schema::cohort_members,
};

/// The host LMS keeps group membership in its own `cohort_members` table; we
/// share the database and go through this store only.
pub struct CohortPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CohortPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CohortStore for CohortPostgres {
    async fn add_member(&self, cohort_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::insert_into(cohort_members::table)
            .values(&InsertCohortMemberEntity {
                cohort_id,
                user_id,
                added_at: Utc::now(),
            })
            .on_conflict((cohort_members::cohort_id, cohort_members::user_id))
            .do_nothing()
            .execute(&mut conn)?;

        Ok(())
    }

    async fn remove_member(&self, cohort_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(cohort_members::table)
            .filter(cohort_members::cohort_id.eq(cohort_id))
            .filter(cohort_members::user_id.eq(user_id))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn is_member(&self, cohort_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let existing = cohort_members::table
            .filter(cohort_members::cohort_id.eq(cohort_id))
            .filter(cohort_members::user_id.eq(user_id))
            .select(cohort_members::user_id)
            .first::<Uuid>(&mut conn)
            .optional()?;

        Ok(existing.is_some())
    }
}
