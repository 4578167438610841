use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::cohort_members;

#[derive(Debug, Clone, Selectable, Queryable)]
#[diesel(table_name = cohort_members)]
pub struct CohortMemberEntity {
    pub cohort_id: Uuid,
    pub user_id: Uuid,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = cohort_members)]
pub struct InsertCohortMemberEntity {
    pub cohort_id: Uuid,
    pub user_id: Uuid,
    pub added_at: DateTime<Utc>,
}
