use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::cancellations::InsertCancellationEntity,
    repositories::cancellations::CancellationRepository, schema::cancellations,
};

pub struct CancellationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CancellationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CancellationRepository for CancellationPostgres {
    async fn insert(&self, insert_cancellation_entity: InsertCancellationEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(cancellations::table)
            .values(&insert_cancellation_entity)
            .returning(cancellations::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }
}
