use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, FromJsonQueryResult, Set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-channel quantities held back from shared availability.
///
/// Persisted as a JSON column but always read and written through this
/// typed map; malformed stored values fail deserialization instead of
/// leaking into availability math.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ChannelBuffers(pub BTreeMap<String, i64>);

impl ChannelBuffers {
    pub fn get(&self, channel: &str) -> i64 {
        self.0.get(channel).copied().unwrap_or(0)
    }

    /// Sets a channel's buffer; zero removes the entry.
    pub fn set(&mut self, channel: &str, quantity: i64) {
        if quantity == 0 {
            self.0.remove(channel);
        } else {
            self.0.insert(channel.to_string(), quantity);
        }
    }

    /// Sum of every buffer except the named channel's own.
    pub fn total_excluding(&self, channel: &str) -> i64 {
        self.0
            .iter()
            .filter(|(ch, _)| ch.as_str() != channel)
            .map(|(_, qty)| qty)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One row per (tenant, variant, location). Created lazily on first
/// movement, never hard-deleted, only zeroed.
///
/// Invariant: `0 <= reserved <= on_hand` after every committed mutation.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub variant_id: Uuid,
    pub location_id: Uuid,
    pub on_hand: i64,
    pub reserved: i64,
    pub safety_stock: i64,
    #[sea_orm(column_type = "Json")]
    pub channel_buffers: ChannelBuffers,
    pub last_counted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// On-hand minus reserved; sellable before channel adjustments.
    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut model = self;
        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = model.id {
                model.id = Set(Uuid::new_v4());
            }
            model.created_at = Set(now);
        }
        model.updated_at = Set(Some(now));
        Ok(model)
    }
}
