use crate::context::RequestContext;
use crate::db::DbPool;
use crate::entities::location::{self, Entity as Locations, LocationKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

pub async fn find<C>(
    db: &C,
    tenant_id: Uuid,
    location_id: Uuid,
) -> Result<Option<location::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Locations::find()
        .filter(location::Column::TenantId.eq(tenant_id))
        .filter(location::Column::Id.eq(location_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

pub async fn ensure_exists<C>(
    db: &C,
    tenant_id: Uuid,
    location_id: Uuid,
) -> Result<location::Model, ServiceError>
where
    C: ConnectionTrait,
{
    find(db, tenant_id, location_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Location {location_id} not found")))
}

pub async fn ensure_active<C>(
    db: &C,
    tenant_id: Uuid,
    location_id: Uuid,
) -> Result<location::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let loc = ensure_exists(db, tenant_id, location_id).await?;
    if !loc.active {
        return Err(ServiceError::InvalidOperation(format!(
            "Location {} is deactivated",
            loc.name
        )));
    }
    Ok(loc)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewLocation {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub kind: LocationKind,
    pub external_ref: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

/// Administrative access to stock-holding locations. Locations are
/// soft-deactivated, never removed while stock references them (RESTRICT
/// foreign keys back this up at the store level).
#[derive(Clone)]
pub struct LocationService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl LocationService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, ctx, location), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        location: NewLocation,
    ) -> Result<location::Model, ServiceError> {
        location.validate()?;
        let name = location.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Location name must not be blank".to_string(),
            ));
        }

        let active = location::ActiveModel {
            tenant_id: Set(ctx.tenant_id),
            name: Set(name),
            kind: Set(location.kind.to_string()),
            active: Set(true),
            external_ref: Set(location.external_ref),
            priority: Set(location.priority),
            ..Default::default()
        };

        let created = active
            .insert(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(location_id = %created.id, name = %created.name, "Location created");
        Ok(created)
    }

    /// Soft-deactivates a location; already-inactive is a no-op.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn deactivate(
        &self,
        ctx: &RequestContext,
        location_id: Uuid,
    ) -> Result<location::Model, ServiceError> {
        let loc = ensure_exists(self.db.as_ref(), ctx.tenant_id, location_id).await?;
        if !loc.active {
            return Ok(loc);
        }

        let mut active: location::ActiveModel = loc.into();
        active.active = Set(false);
        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(location_id = %location_id, "Location deactivated");
        self.event_sender
            .emit(Event::LocationDeactivated {
                tenant_id: ctx.tenant_id,
                location_id,
            })
            .await;
        Ok(updated)
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn get(
        &self,
        ctx: &RequestContext,
        location_id: Uuid,
    ) -> Result<location::Model, ServiceError> {
        ensure_exists(self.db.as_ref(), ctx.tenant_id, location_id).await
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id))]
    pub async fn list(
        &self,
        ctx: &RequestContext,
        include_inactive: bool,
    ) -> Result<Vec<location::Model>, ServiceError> {
        let mut query = Locations::find().filter(location::Column::TenantId.eq(ctx.tenant_id));
        if !include_inactive {
            query = query.filter(location::Column::Active.eq(true));
        }
        query
            .order_by_asc(location::Column::Priority)
            .order_by_asc(location::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}
