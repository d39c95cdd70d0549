use crate::context::RequestContext;
use crate::db::DbPool;
use crate::entities::stock_movement::{
    self, Entity as StockMovements, MovementDirection, MovementReason,
};
use crate::errors::ServiceError;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// One audit row to append alongside the stock mutation it documents.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub variant_id: Uuid,
    pub location_id: Uuid,
    pub direction: MovementDirection,
    pub quantity: i64,
    pub reason: MovementReason,
    pub reference: Option<String>,
}

/// Appends a movement inside the caller's transaction, so movement and
/// mutation commit or roll back together.
pub async fn append<C>(
    txn: &C,
    ctx: &RequestContext,
    movement: NewMovement,
) -> Result<stock_movement::Model, ServiceError>
where
    C: ConnectionTrait,
{
    // Movement quantities are computed by the engine; zero or negative here
    // means ledger math went wrong upstream.
    if movement.quantity <= 0 {
        return Err(ServiceError::InternalError(format!(
            "movement quantity must be positive, got {}",
            movement.quantity
        )));
    }

    let active = stock_movement::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        variant_id: Set(movement.variant_id),
        location_id: Set(movement.location_id),
        direction: Set(movement.direction.to_string()),
        quantity: Set(movement.quantity),
        reason: Set(movement.reason.to_string()),
        reference: Set(movement.reference),
        actor_id: Set(ctx.actor_id),
        ..Default::default()
    };

    active.insert(txn).await.map_err(ServiceError::db_error)
}

/// Read path over the movement log.
#[derive(Clone)]
pub struct MovementService {
    db: Arc<DbPool>,
}

impl MovementService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Lists movements for a variant, newest first, optionally scoped to
    /// one location.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn list(
        &self,
        ctx: &RequestContext,
        variant_id: Uuid,
        location_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let mut query = StockMovements::find()
            .filter(stock_movement::Column::TenantId.eq(ctx.tenant_id))
            .filter(stock_movement::Column::VariantId.eq(variant_id));
        if let Some(location_id) = location_id {
            query = query.filter(stock_movement::Column::LocationId.eq(location_id));
        }
        let query = query.order_by_desc(stock_movement::Column::CreatedAt);

        let paginator = query.paginate(self.db.as_ref(), limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let movements = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((movements, total))
    }
}
