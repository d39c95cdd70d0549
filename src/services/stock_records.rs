use crate::context::RequestContext;
use crate::db::DbPool;
use crate::entities::stock_movement::{MovementDirection, MovementReason};
use crate::entities::stock_record::{self, ChannelBuffers, Entity as StockRecords};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{locations, movements};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub async fn get<C>(
    db: &C,
    tenant_id: Uuid,
    variant_id: Uuid,
    location_id: Uuid,
) -> Result<Option<stock_record::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    StockRecords::find()
        .filter(stock_record::Column::TenantId.eq(tenant_id))
        .filter(stock_record::Column::VariantId.eq(variant_id))
        .filter(stock_record::Column::LocationId.eq(location_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Reads a stock record with a row lock (`SELECT ... FOR UPDATE`), so a
/// concurrent read-modify-write on the same record serializes in the store.
/// Only meaningful inside an open transaction.
pub async fn get_for_update<C>(
    txn: &C,
    tenant_id: Uuid,
    variant_id: Uuid,
    location_id: Uuid,
) -> Result<Option<stock_record::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    StockRecords::find()
        .filter(stock_record::Column::TenantId.eq(tenant_id))
        .filter(stock_record::Column::VariantId.eq(variant_id))
        .filter(stock_record::Column::LocationId.eq(location_id))
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(ServiceError::db_error)
}

/// Applies an on-hand delta, creating a zeroed record first if none exists.
///
/// Over-large decrements clamp at zero rather than going negative; the
/// returned applied delta is what actually hit the ledger, so callers write
/// movement rows for the applied amount. A decrement that would leave
/// `on_hand < reserved` fails with `Conflict` instead of stranding
/// reservations.
pub async fn upsert_delta<C>(
    txn: &C,
    tenant_id: Uuid,
    variant_id: Uuid,
    location_id: Uuid,
    delta: i64,
) -> Result<(stock_record::Model, i64), ServiceError>
where
    C: ConnectionTrait,
{
    match get_for_update(txn, tenant_id, variant_id, location_id).await? {
        Some(record) => {
            let target = (record.on_hand + delta).max(0);
            if target < record.reserved {
                return Err(ServiceError::Conflict(format!(
                    "cannot drop on-hand to {target} below reserved {} for variant {variant_id} at location {location_id}",
                    record.reserved
                )));
            }
            let applied = target - record.on_hand;
            if applied == 0 {
                return Ok((record, 0));
            }
            let mut active: stock_record::ActiveModel = record.into();
            active.on_hand = Set(target);
            let updated = active.update(txn).await.map_err(ServiceError::db_error)?;
            Ok((updated, applied))
        }
        None => {
            let target = delta.max(0);
            let active = stock_record::ActiveModel {
                tenant_id: Set(tenant_id),
                variant_id: Set(variant_id),
                location_id: Set(location_id),
                on_hand: Set(target),
                reserved: Set(0),
                safety_stock: Set(0),
                channel_buffers: Set(ChannelBuffers::default()),
                ..Default::default()
            };
            let created = active.insert(txn).await.map_err(ServiceError::db_error)?;
            Ok((created, target))
        }
    }
}

/// Finds or lazily creates the record for a (variant, location) pair,
/// holding its row lock either way.
pub async fn ensure_record<C>(
    txn: &C,
    tenant_id: Uuid,
    variant_id: Uuid,
    location_id: Uuid,
) -> Result<stock_record::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let (record, _) = upsert_delta(txn, tenant_id, variant_id, location_id, 0).await?;
    Ok(record)
}

/// Write access to per-(variant, location) stock rows: absolute level sets
/// and the availability inputs (safety stock, channel buffers).
#[derive(Clone)]
pub struct StockRecordService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl StockRecordService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn get_record(
        &self,
        ctx: &RequestContext,
        variant_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<stock_record::Model>, ServiceError> {
        get(self.db.as_ref(), ctx.tenant_id, variant_id, location_id).await
    }

    /// Sets an absolute on-hand level by computing the implied delta against
    /// the current level and routing it through the shared mutation path, so
    /// a movement row is produced whenever the delta is non-zero.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn set_level(
        &self,
        ctx: &RequestContext,
        variant_id: Uuid,
        location_id: Uuid,
        quantity: i64,
        reason: MovementReason,
    ) -> Result<stock_record::Model, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Stock level must be non-negative".to_string(),
            ));
        }

        let ctx_inner = ctx.clone();
        let (record, applied) = self
            .db
            .transaction::<_, (stock_record::Model, i64), ServiceError>(move |txn| {
                Box::pin(async move {
                    locations::ensure_exists(txn, ctx_inner.tenant_id, location_id).await?;

                    let current =
                        get_for_update(txn, ctx_inner.tenant_id, variant_id, location_id).await?;
                    let current_on_hand = current.map(|r| r.on_hand).unwrap_or(0);
                    let (record, applied) = upsert_delta(
                        txn,
                        ctx_inner.tenant_id,
                        variant_id,
                        location_id,
                        quantity - current_on_hand,
                    )
                    .await?;

                    if applied != 0 {
                        let direction = if applied > 0 {
                            MovementDirection::In
                        } else {
                            MovementDirection::Out
                        };
                        movements::append(
                            txn,
                            &ctx_inner,
                            movements::NewMovement {
                                variant_id,
                                location_id,
                                direction,
                                quantity: applied.abs(),
                                reason,
                                reference: None,
                            },
                        )
                        .await?;
                    }

                    // An absolute set is a count correction.
                    let mut active: stock_record::ActiveModel = record.into();
                    active.last_counted_at = Set(Some(Utc::now()));
                    let record = active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok((record, applied))
                })
            })
            .await?;

        info!(
            variant_id = %variant_id,
            location_id = %location_id,
            on_hand = record.on_hand,
            applied = applied,
            "Stock level set"
        );
        if applied != 0 {
            self.event_sender
                .emit(Event::StockAdjusted {
                    tenant_id: ctx.tenant_id,
                    variant_id,
                    location_id,
                    delta: applied,
                    new_on_hand: record.on_hand,
                    reason: reason.to_string(),
                })
                .await;
        }
        Ok(record)
    }

    /// Sets the floor below which on-hand is never offered for sale.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn set_safety_stock(
        &self,
        ctx: &RequestContext,
        variant_id: Uuid,
        location_id: Uuid,
        quantity: i64,
    ) -> Result<stock_record::Model, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Safety stock must be non-negative".to_string(),
            ));
        }

        let ctx_inner = ctx.clone();
        let record = self
            .db
            .transaction::<_, stock_record::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    locations::ensure_exists(txn, ctx_inner.tenant_id, location_id).await?;
                    let record =
                        ensure_record(txn, ctx_inner.tenant_id, variant_id, location_id).await?;
                    let mut active: stock_record::ActiveModel = record.into();
                    active.safety_stock = Set(quantity);
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await?;

        info!(variant_id = %variant_id, location_id = %location_id, safety_stock = quantity, "Safety stock set");
        Ok(record)
    }

    /// Sets one channel's private buffer on the typed buffer map; zero
    /// removes the entry.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn set_channel_buffer(
        &self,
        ctx: &RequestContext,
        variant_id: Uuid,
        location_id: Uuid,
        channel: &str,
        quantity: i64,
    ) -> Result<stock_record::Model, ServiceError> {
        let channel = channel.trim().to_string();
        if channel.is_empty() {
            return Err(ServiceError::ValidationError(
                "Channel name must not be empty".to_string(),
            ));
        }
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Channel buffer must be non-negative".to_string(),
            ));
        }

        let ctx_inner = ctx.clone();
        let record = self
            .db
            .transaction::<_, stock_record::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    locations::ensure_exists(txn, ctx_inner.tenant_id, location_id).await?;
                    let record =
                        ensure_record(txn, ctx_inner.tenant_id, variant_id, location_id).await?;
                    let mut buffers = record.channel_buffers.clone();
                    buffers.set(&channel, quantity);
                    let mut active: stock_record::ActiveModel = record.into();
                    active.channel_buffers = Set(buffers);
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await?;

        info!(variant_id = %variant_id, location_id = %location_id, "Channel buffer set");
        Ok(record)
    }
}
