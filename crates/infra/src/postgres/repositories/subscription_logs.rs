use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::subscription_logs::InsertSubscriptionLogEntity,
    repositories::subscription_logs::SubscriptionLogRepository, schema::subscription_logs,
};

pub struct SubscriptionLogPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionLogPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionLogRepository for SubscriptionLogPostgres {
    async fn insert(&self, insert_log_entity: InsertSubscriptionLogEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(subscription_logs::table)
            .values(&insert_log_entity)
            .returning(subscription_logs::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }
}
