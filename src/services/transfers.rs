use crate::context::RequestContext;
use crate::db::DbPool;
use crate::entities::stock_movement::{MovementDirection, MovementReason};
use crate::entities::stock_record;
use crate::entities::transfer::{self, Entity as Transfers, TransferStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{locations, movements, stock_records};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTransfer {
    pub variant_id: Uuid,
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(length(max = 255))]
    pub reference: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Moves stock between two locations as an atomic two-sided operation.
///
/// Unlike a reservation batch, a transfer is all-or-nothing: completion
/// either moves the full quantity and writes both movement rows, or fails
/// and moves nothing.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl TransferService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a transfer in `pending` status. No stock moves until
    /// completion.
    #[instrument(skip(self, ctx, transfer), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        transfer: NewTransfer,
    ) -> Result<transfer::Model, ServiceError> {
        transfer.validate()?;
        if transfer.from_location_id == transfer.to_location_id {
            return Err(ServiceError::ValidationError(
                "Transfer source and destination must differ".to_string(),
            ));
        }

        let ctx_inner = ctx.clone();
        let created = self
            .db
            .transaction::<_, transfer::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    locations::ensure_active(txn, ctx_inner.tenant_id, transfer.from_location_id)
                        .await?;
                    locations::ensure_active(txn, ctx_inner.tenant_id, transfer.to_location_id)
                        .await?;

                    transfer::ActiveModel {
                        tenant_id: Set(ctx_inner.tenant_id),
                        variant_id: Set(transfer.variant_id),
                        from_location_id: Set(transfer.from_location_id),
                        to_location_id: Set(transfer.to_location_id),
                        quantity: Set(transfer.quantity),
                        status: Set(TransferStatus::Pending.as_str().to_string()),
                        reference: Set(transfer.reference.clone()),
                        notes: Set(transfer.notes.clone()),
                        created_by: Set(ctx_inner.actor_id),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)
                })
            })
            .await?;

        info!(transfer_id = %created.id, quantity = created.quantity, "Transfer created");
        Ok(created)
    }

    /// Marks a pending transfer as on its way.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn mark_in_transit(
        &self,
        ctx: &RequestContext,
        transfer_id: Uuid,
    ) -> Result<transfer::Model, ServiceError> {
        let ctx_inner = ctx.clone();
        let updated = self
            .db
            .transaction::<_, transfer::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let found = find_for_update(txn, ctx_inner.tenant_id, transfer_id).await?;
                    match found.status() {
                        Some(TransferStatus::Pending) => {}
                        other => {
                            return Err(ServiceError::InvalidOperation(format!(
                                "Cannot mark transfer {transfer_id} in transit from status {}",
                                status_name(other)
                            )));
                        }
                    }
                    let mut active: transfer::ActiveModel = found.into();
                    active.status = Set(TransferStatus::InTransit.as_str().to_string());
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await?;

        info!(transfer_id = %transfer_id, "Transfer marked in transit");
        Ok(updated)
    }

    /// Completes a transfer: decrements source on-hand, increments
    /// destination on-hand (creating its record lazily) and appends the
    /// `transfer_out`/`transfer_in` movement pair, all in one transaction.
    ///
    /// The source must have `available >= quantity`; completion never
    /// strands units already reserved there.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn complete(
        &self,
        ctx: &RequestContext,
        transfer_id: Uuid,
    ) -> Result<transfer::Model, ServiceError> {
        let ctx_inner = ctx.clone();
        let completed = self
            .db
            .transaction::<_, transfer::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let found = find_for_update(txn, ctx_inner.tenant_id, transfer_id).await?;
                    match found.status() {
                        Some(TransferStatus::Pending) | Some(TransferStatus::InTransit) => {}
                        other => {
                            return Err(ServiceError::InvalidOperation(format!(
                                "Cannot complete transfer {transfer_id} from status {}",
                                status_name(other)
                            )));
                        }
                    }

                    let source = stock_records::get_for_update(
                        txn,
                        ctx_inner.tenant_id,
                        found.variant_id,
                        found.from_location_id,
                    )
                    .await?;
                    let available = source.as_ref().map(|r| r.available()).unwrap_or(0);
                    if available < found.quantity {
                        return Err(ServiceError::InsufficientStock {
                            requested: found.quantity,
                            available,
                        });
                    }
                    // available >= quantity implies the source row exists.
                    let source = source.ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "missing stock record for transfer {transfer_id}"
                        ))
                    })?;

                    let new_on_hand = source.on_hand - found.quantity;
                    let mut active_source: stock_record::ActiveModel = source.into();
                    active_source.on_hand = Set(new_on_hand);
                    active_source
                        .update(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    movements::append(
                        txn,
                        &ctx_inner,
                        movements::NewMovement {
                            variant_id: found.variant_id,
                            location_id: found.from_location_id,
                            direction: MovementDirection::Out,
                            quantity: found.quantity,
                            reason: MovementReason::TransferOut,
                            reference: Some(found.id.to_string()),
                        },
                    )
                    .await?;

                    stock_records::upsert_delta(
                        txn,
                        ctx_inner.tenant_id,
                        found.variant_id,
                        found.to_location_id,
                        found.quantity,
                    )
                    .await?;

                    movements::append(
                        txn,
                        &ctx_inner,
                        movements::NewMovement {
                            variant_id: found.variant_id,
                            location_id: found.to_location_id,
                            direction: MovementDirection::In,
                            quantity: found.quantity,
                            reason: MovementReason::TransferIn,
                            reference: Some(found.id.to_string()),
                        },
                    )
                    .await?;

                    let mut active: transfer::ActiveModel = found.into();
                    active.status = Set(TransferStatus::Completed.as_str().to_string());
                    active.completed_by = Set(Some(ctx_inner.actor_id));
                    active.completed_at = Set(Some(Utc::now()));
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await?;

        info!(
            transfer_id = %completed.id,
            quantity = completed.quantity,
            "Transfer completed"
        );
        self.event_sender
            .emit(Event::TransferCompleted {
                tenant_id: ctx.tenant_id,
                transfer_id: completed.id,
                variant_id: completed.variant_id,
                from_location_id: completed.from_location_id,
                to_location_id: completed.to_location_id,
                quantity: completed.quantity,
            })
            .await;
        Ok(completed)
    }

    /// Cancels a transfer that has not completed. Nothing was moved yet, so
    /// there is no stock effect; cancelling twice is a no-op.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn cancel(
        &self,
        ctx: &RequestContext,
        transfer_id: Uuid,
    ) -> Result<transfer::Model, ServiceError> {
        let ctx_inner = ctx.clone();
        let cancelled = self
            .db
            .transaction::<_, transfer::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let found = find_for_update(txn, ctx_inner.tenant_id, transfer_id).await?;
                    match found.status() {
                        Some(TransferStatus::Cancelled) => return Ok(found),
                        Some(TransferStatus::Completed) => {
                            return Err(ServiceError::InvalidOperation(format!(
                                "Cannot cancel completed transfer {transfer_id}"
                            )));
                        }
                        _ => {}
                    }
                    let mut active: transfer::ActiveModel = found.into();
                    active.status = Set(TransferStatus::Cancelled.as_str().to_string());
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await?;

        info!(transfer_id = %transfer_id, "Transfer cancelled");
        Ok(cancelled)
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn get(
        &self,
        ctx: &RequestContext,
        transfer_id: Uuid,
    ) -> Result<transfer::Model, ServiceError> {
        Transfers::find()
            .filter(transfer::Column::TenantId.eq(ctx.tenant_id))
            .filter(transfer::Column::Id.eq(transfer_id))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {transfer_id} not found")))
    }
}

async fn find_for_update<C>(
    txn: &C,
    tenant_id: Uuid,
    transfer_id: Uuid,
) -> Result<transfer::Model, ServiceError>
where
    C: ConnectionTrait,
{
    Transfers::find()
        .filter(transfer::Column::TenantId.eq(tenant_id))
        .filter(transfer::Column::Id.eq(transfer_id))
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Transfer {transfer_id} not found")))
}

fn status_name(status: Option<TransferStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("unknown")
}
