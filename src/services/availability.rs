use crate::context::RequestContext;
use crate::db::DbPool;
use crate::entities::stock_record::{self, Entity as StockRecords};
use crate::errors::ServiceError;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Sellable quantity of one record as seen from one channel.
///
/// A channel's own buffer is added back to its own view and subtracted
/// from every other channel's, so buffers never double-count. Safety stock
/// is a floor subtracted for every channel equally. The result is clamped
/// at zero per record before summing, so one location's imbalance cannot
/// offset another's surplus.
pub fn per_record_available(record: &stock_record::Model, channel: &str) -> i64 {
    let shared = record.on_hand - record.reserved - record.safety_stock;
    let foreign_buffers = record.channel_buffers.total_excluding(channel);
    let own_buffer = record.channel_buffers.get(channel);
    (shared - foreign_buffers + own_buffer).max(0)
}

/// Pure read path: derives per-channel sellable quantity from stock record
/// state. Never mutates.
#[derive(Clone)]
pub struct AvailabilityService {
    db: Arc<DbPool>,
}

impl AvailabilityService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Total sellable quantity of a variant through a channel, across all
    /// locations or one.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn get_available(
        &self,
        ctx: &RequestContext,
        variant_id: Uuid,
        channel: &str,
        location_id: Option<Uuid>,
    ) -> Result<i64, ServiceError> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(ServiceError::ValidationError(
                "Channel name must not be empty".to_string(),
            ));
        }

        let mut query = StockRecords::find()
            .filter(stock_record::Column::TenantId.eq(ctx.tenant_id))
            .filter(stock_record::Column::VariantId.eq(variant_id));
        if let Some(location_id) = location_id {
            query = query.filter(stock_record::Column::LocationId.eq(location_id));
        }

        let records = query
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(records
            .iter()
            .map(|record| per_record_available(record, channel))
            .sum())
    }
}
