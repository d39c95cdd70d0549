use crate::context::RequestContext;
use crate::db::DbPool;
use crate::entities::reservation::{self, Entity as Reservations, ReservationStatus};
use crate::entities::stock_movement::{MovementDirection, MovementReason};
use crate::entities::stock_record;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{movements, stock_records};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// One requested hold in a reservation batch.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReservationLine {
    pub variant_id: Uuid,
    pub location_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i64,
    pub order_id: Uuid,
    /// Defaults to now + the configured TTL when unspecified.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of one line in a reservation batch. A batch is best-effort:
/// callers must inspect every entry rather than assume all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationLineResult {
    pub success: bool,
    pub reservation_id: Option<Uuid>,
    /// Availability after a successful hold, or the unchanged availability
    /// that made the line fail.
    pub available_quantity: i64,
    pub shortfall: Option<i64>,
    pub error: Option<String>,
}

impl ReservationLineResult {
    fn reserved(reservation_id: Uuid, available_quantity: i64) -> Self {
        Self {
            success: true,
            reservation_id: Some(reservation_id),
            available_quantity,
            shortfall: None,
            error: None,
        }
    }

    fn short(requested: i64, available: i64) -> Self {
        let err = ServiceError::InsufficientStock {
            requested,
            available,
        };
        Self {
            success: false,
            reservation_id: None,
            available_quantity: available,
            shortfall: Some(requested - available),
            error: Some(err.to_string()),
        }
    }
}

/// Result of one expiry sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySweep {
    pub expired_count: u64,
    pub swept_at: DateTime<Utc>,
}

/// Holds and releases stock against orders.
///
/// Every reservation's `quantity` is immutable once created; release,
/// expiry and fulfillment reverse exactly the stored amount, never a
/// caller-supplied one.
#[derive(Clone)]
pub struct ReservationService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    default_ttl: Duration,
}

impl ReservationService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, default_ttl_hours: i64) -> Self {
        Self {
            db,
            event_sender,
            default_ttl: Duration::hours(default_ttl_hours),
        }
    }

    /// Reserves stock for a batch of order lines in one transaction.
    ///
    /// Lines are processed sequentially inside the transaction so lock
    /// acquisition order stays deterministic. A line whose availability
    /// falls short produces a failure entry and the batch moves on;
    /// reserving never touches on-hand.
    #[instrument(skip(self, ctx, lines), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id, line_count = lines.len()))]
    pub async fn reserve(
        &self,
        ctx: &RequestContext,
        lines: Vec<ReservationLine>,
    ) -> Result<Vec<ReservationLineResult>, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Reservation batch must contain at least one line".to_string(),
            ));
        }
        for line in &lines {
            line.validate()?;
        }

        let ctx_inner = ctx.clone();
        let batch = lines.clone();
        let default_ttl = self.default_ttl;
        let results = self
            .db
            .transaction::<_, Vec<ReservationLineResult>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut results = Vec::with_capacity(batch.len());
                    for line in &batch {
                        let record = stock_records::get_for_update(
                            txn,
                            ctx_inner.tenant_id,
                            line.variant_id,
                            line.location_id,
                        )
                        .await?;

                        let record = match record {
                            Some(record) => record,
                            None => {
                                results.push(ReservationLineResult::short(line.quantity, 0));
                                continue;
                            }
                        };

                        let available = record.available();
                        if available < line.quantity {
                            results.push(ReservationLineResult::short(line.quantity, available));
                            continue;
                        }

                        let new_reserved = record.reserved + line.quantity;
                        let mut active: stock_record::ActiveModel = record.into();
                        active.reserved = Set(new_reserved);
                        active.update(txn).await.map_err(ServiceError::db_error)?;

                        let expires_at = line
                            .expires_at
                            .unwrap_or_else(|| Utc::now() + default_ttl);
                        let held = reservation::ActiveModel {
                            tenant_id: Set(ctx_inner.tenant_id),
                            variant_id: Set(line.variant_id),
                            location_id: Set(line.location_id),
                            order_id: Set(line.order_id),
                            quantity: Set(line.quantity),
                            status: Set(ReservationStatus::Active.as_str().to_string()),
                            expires_at: Set(expires_at),
                            created_by: Set(ctx_inner.actor_id),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                        movements::append(
                            txn,
                            &ctx_inner,
                            movements::NewMovement {
                                variant_id: line.variant_id,
                                location_id: line.location_id,
                                direction: MovementDirection::Out,
                                quantity: line.quantity,
                                reason: MovementReason::Reservation,
                                reference: Some(line.order_id.to_string()),
                            },
                        )
                        .await?;

                        results.push(ReservationLineResult::reserved(
                            held.id,
                            available - line.quantity,
                        ));
                    }
                    Ok(results)
                })
            })
            .await?;

        let successes = results.iter().filter(|r| r.success).count();
        info!(
            successes = successes,
            failures = results.len() - successes,
            "Reservation batch processed"
        );
        for (line, result) in lines.iter().zip(&results) {
            if let Some(reservation_id) = result.reservation_id {
                self.event_sender
                    .emit(Event::StockReserved {
                        tenant_id: ctx.tenant_id,
                        variant_id: line.variant_id,
                        location_id: line.location_id,
                        order_id: line.order_id,
                        reservation_id,
                        quantity: line.quantity,
                    })
                    .await;
            }
        }
        Ok(results)
    }

    /// Releases the given reservations. Unknown ids and reservations already
    /// in a terminal state are skipped, so calling this twice with the same
    /// list leaves the same end state.
    #[instrument(skip(self, ctx, reservation_ids), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn release_by_ids(
        &self,
        ctx: &RequestContext,
        reservation_ids: &[Uuid],
    ) -> Result<u64, ServiceError> {
        if reservation_ids.is_empty() {
            return Ok(0);
        }

        // Sorted and deduplicated so overlapping release batches acquire
        // row locks in the same order.
        let mut ids = reservation_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let ctx_inner = ctx.clone();
        let released = self
            .db
            .transaction::<_, u64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut released = 0u64;
                    for id in ids {
                        let held = Reservations::find()
                            .filter(reservation::Column::TenantId.eq(ctx_inner.tenant_id))
                            .filter(reservation::Column::Id.eq(id))
                            .lock_exclusive()
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        let held = match held {
                            Some(held) if held.is_active() => held,
                            _ => continue,
                        };
                        settle_reservation(
                            txn,
                            &ctx_inner,
                            held,
                            ReservationStatus::Cancelled,
                            MovementReason::ReservationReleased,
                        )
                        .await?;
                        released += 1;
                    }
                    Ok(released)
                })
            })
            .await?;

        info!(released = released, "Reservations released by id");
        if released > 0 {
            self.event_sender
                .emit(Event::ReservationsReleased {
                    tenant_id: ctx.tenant_id,
                    order_id: None,
                    released_count: released,
                })
                .await;
        }
        Ok(released)
    }

    /// Releases every active reservation held for an order.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn release_by_order(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let ctx_inner = ctx.clone();
        let released = self
            .db
            .transaction::<_, u64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let held = active_for_order(txn, ctx_inner.tenant_id, order_id).await?;
                    let mut released = 0u64;
                    for reservation in held {
                        settle_reservation(
                            txn,
                            &ctx_inner,
                            reservation,
                            ReservationStatus::Cancelled,
                            MovementReason::ReservationReleased,
                        )
                        .await?;
                        released += 1;
                    }
                    Ok(released)
                })
            })
            .await?;

        info!(order_id = %order_id, released = released, "Reservations released by order");
        if released > 0 {
            self.event_sender
                .emit(Event::ReservationsReleased {
                    tenant_id: ctx.tenant_id,
                    order_id: Some(order_id),
                    released_count: released,
                })
                .await;
        }
        Ok(released)
    }

    /// Expires every active reservation whose deadline has passed.
    ///
    /// Pull-based: an external scheduler calls this periodically. Until
    /// swept, an overdue reservation still counts as active and still holds
    /// stock.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn expire_due(
        &self,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<ExpirySweep, ServiceError> {
        let ctx_inner = ctx.clone();
        let expired = self
            .db
            .transaction::<_, u64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let due = Reservations::find()
                        .filter(reservation::Column::TenantId.eq(ctx_inner.tenant_id))
                        .filter(
                            reservation::Column::Status.eq(ReservationStatus::Active.as_str()),
                        )
                        .filter(reservation::Column::ExpiresAt.lt(now))
                        .order_by_asc(reservation::Column::Id)
                        .lock_exclusive()
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let mut expired = 0u64;
                    for reservation in due {
                        settle_reservation(
                            txn,
                            &ctx_inner,
                            reservation,
                            ReservationStatus::Expired,
                            MovementReason::ReservationExpired,
                        )
                        .await?;
                        expired += 1;
                    }
                    Ok(expired)
                })
            })
            .await?;

        info!(expired = expired, "Expired reservation sweep completed");
        if expired > 0 {
            self.event_sender
                .emit(Event::ReservationsExpired {
                    tenant_id: ctx.tenant_id,
                    expired_count: expired,
                })
                .await;
        }
        Ok(ExpirySweep {
            expired_count: expired,
            swept_at: now,
        })
    }

    /// Fulfills every active reservation of an order: the held units ship,
    /// so both `reserved` and `on_hand` drop by the stored quantity.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn fulfill_by_order(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let ctx_inner = ctx.clone();
        let fulfilled = self
            .db
            .transaction::<_, u64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let held = active_for_order(txn, ctx_inner.tenant_id, order_id).await?;
                    let mut fulfilled = 0u64;
                    for reservation in held {
                        let record = stock_records::get_for_update(
                            txn,
                            ctx_inner.tenant_id,
                            reservation.variant_id,
                            reservation.location_id,
                        )
                        .await?
                        .ok_or_else(|| ledger_drift(&reservation))?;

                        if record.reserved < reservation.quantity
                            || record.on_hand < reservation.quantity
                        {
                            return Err(ledger_drift(&reservation));
                        }

                        let new_reserved = record.reserved - reservation.quantity;
                        let new_on_hand = record.on_hand - reservation.quantity;
                        let mut active: stock_record::ActiveModel = record.into();
                        active.reserved = Set(new_reserved);
                        active.on_hand = Set(new_on_hand);
                        active.update(txn).await.map_err(ServiceError::db_error)?;

                        movements::append(
                            txn,
                            &ctx_inner,
                            movements::NewMovement {
                                variant_id: reservation.variant_id,
                                location_id: reservation.location_id,
                                direction: MovementDirection::Out,
                                quantity: reservation.quantity,
                                reason: MovementReason::ReservationFulfilled,
                                reference: Some(reservation.order_id.to_string()),
                            },
                        )
                        .await?;

                        let mut held: reservation::ActiveModel = reservation.into();
                        held.status = Set(ReservationStatus::Fulfilled.as_str().to_string());
                        held.update(txn).await.map_err(ServiceError::db_error)?;
                        fulfilled += 1;
                    }
                    Ok(fulfilled)
                })
            })
            .await?;

        info!(order_id = %order_id, fulfilled = fulfilled, "Reservations fulfilled");
        if fulfilled > 0 {
            self.event_sender
                .emit(Event::ReservationsFulfilled {
                    tenant_id: ctx.tenant_id,
                    order_id,
                    fulfilled_count: fulfilled,
                })
                .await;
        }
        Ok(fulfilled)
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn get(
        &self,
        ctx: &RequestContext,
        reservation_id: Uuid,
    ) -> Result<Option<reservation::Model>, ServiceError> {
        Reservations::find()
            .filter(reservation::Column::TenantId.eq(ctx.tenant_id))
            .filter(reservation::Column::Id.eq(reservation_id))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// All reservations ever taken for an order, newest first.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn list_for_order(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
    ) -> Result<Vec<reservation::Model>, ServiceError> {
        Reservations::find()
            .filter(reservation::Column::TenantId.eq(ctx.tenant_id))
            .filter(reservation::Column::OrderId.eq(order_id))
            .order_by_desc(reservation::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Active reservations of an order in id order, row-locked.
async fn active_for_order<C>(
    txn: &C,
    tenant_id: Uuid,
    order_id: Uuid,
) -> Result<Vec<reservation::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Reservations::find()
        .filter(reservation::Column::TenantId.eq(tenant_id))
        .filter(reservation::Column::OrderId.eq(order_id))
        .filter(reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
        .order_by_asc(reservation::Column::Id)
        .lock_exclusive()
        .all(txn)
        .await
        .map_err(ServiceError::db_error)
}

/// Moves an active reservation to a terminal non-fulfilled state and gives
/// the held units back: `reserved` drops by the reservation's own stored
/// quantity, on-hand is untouched.
async fn settle_reservation<C>(
    txn: &C,
    ctx: &RequestContext,
    reservation: reservation::Model,
    status: ReservationStatus,
    reason: MovementReason,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let record = stock_records::get_for_update(
        txn,
        ctx.tenant_id,
        reservation.variant_id,
        reservation.location_id,
    )
    .await?
    .ok_or_else(|| ledger_drift(&reservation))?;

    if record.reserved < reservation.quantity {
        warn!(
            reservation_id = %reservation.id,
            reserved = record.reserved,
            quantity = reservation.quantity,
            "Reserved quantity below reservation quantity"
        );
        return Err(ledger_drift(&reservation));
    }

    let new_reserved = record.reserved - reservation.quantity;
    let mut active: stock_record::ActiveModel = record.into();
    active.reserved = Set(new_reserved);
    active.update(txn).await.map_err(ServiceError::db_error)?;

    movements::append(
        txn,
        ctx,
        movements::NewMovement {
            variant_id: reservation.variant_id,
            location_id: reservation.location_id,
            direction: MovementDirection::In,
            quantity: reservation.quantity,
            reason,
            reference: Some(reservation.order_id.to_string()),
        },
    )
    .await?;

    let mut held: reservation::ActiveModel = reservation.into();
    held.status = Set(status.as_str().to_string());
    held.update(txn).await.map_err(ServiceError::db_error)?;
    Ok(())
}

fn ledger_drift(reservation: &reservation::Model) -> ServiceError {
    ServiceError::InternalError(format!(
        "stock record out of step with reservation {} (variant {}, location {})",
        reservation.id, reservation.variant_id, reservation.location_id
    ))
}
