use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, prelude::*, update};
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity},
    repositories::payments::PaymentRepository,
    schema::payments,
    value_objects::enums::payment_statuses::PaymentStatus,
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn insert(&self, insert_payment_entity: InsertPaymentEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(payments::table)
            .values(&insert_payment_entity)
            .returning(payments::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = payments::table
            .filter(payments::id.eq(payment_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_latest_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = payments::table
            .filter(payments::subscription_id.eq(subscription_id))
            .order((payments::created_at.desc(), payments::id.desc()))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn set_gateway_tx_ref(&self, payment_id: Uuid, gateway_tx_ref: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(payments::table)
            .filter(payments::id.eq(payment_id))
            .set((
                payments::gateway_tx_ref.eq(Some(gateway_tx_ref)),
                payments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_success<'a>(
        &self,
        payment_id: Uuid,
        gateway_tx_ref: Option<&'a str>,
        payment_method: Option<&'a str>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The status filter is the idempotency guard: only one of any number
        // of concurrent confirmations flips the row.
        let affected = update(payments::table)
            .filter(payments::id.eq(payment_id))
            .filter(payments::status.eq(PaymentStatus::Pending.to_string()))
            .set((
                payments::status.eq(PaymentStatus::Success.to_string()),
                payments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        if affected == 0 {
            return Ok(false);
        }

        if let Some(gateway_tx_ref) = gateway_tx_ref {
            update(payments::table)
                .filter(payments::id.eq(payment_id))
                .set(payments::gateway_tx_ref.eq(Some(gateway_tx_ref)))
                .execute(&mut conn)?;
        }
        if let Some(payment_method) = payment_method {
            update(payments::table)
                .filter(payments::id.eq(payment_id))
                .set(payments::payment_method.eq(Some(payment_method)))
                .execute(&mut conn)?;
        }

        Ok(true)
    }

    async fn mark_failed<'a>(&self, payment_id: Uuid, error: Option<&'a str>) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(payments::table)
            .filter(payments::id.eq(payment_id))
            .filter(payments::status.eq(PaymentStatus::Pending.to_string()))
            .set((
                payments::status.eq(PaymentStatus::Failed.to_string()),
                payments::error.eq(error),
                payments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(affected > 0)
    }
}
