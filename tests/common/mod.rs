#![allow(dead_code)]

use inventory_engine::config::EngineConfig;
use inventory_engine::db;
use inventory_engine::entities::location::LocationKind;
use inventory_engine::events::{self, EventSender};
use inventory_engine::services::locations::NewLocation;
use inventory_engine::{InventoryEngine, RequestContext};
use std::sync::Arc;
use uuid::Uuid;

/// Engine over a fresh in-memory SQLite store with migrations applied and
/// a background event consumer running.
pub async fn setup_engine() -> InventoryEngine {
    setup_engine_with(|_| {}).await
}

pub async fn setup_engine_with(tweak: impl FnOnce(&mut EngineConfig)) -> InventoryEngine {
    let mut config = EngineConfig::for_database("sqlite::memory:");
    tweak(&mut config);
    let pool = db::establish_connection(&config).await.expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let (sender, receiver) = EventSender::channel(100);
    tokio::spawn(events::process_events(receiver));

    InventoryEngine::new(Arc::new(pool), sender, &config)
}

pub fn test_ctx() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), Uuid::new_v4())
}

pub async fn seed_location(engine: &InventoryEngine, ctx: &RequestContext, name: &str) -> Uuid {
    engine
        .locations
        .create(
            ctx,
            NewLocation {
                name: name.to_string(),
                kind: LocationKind::Warehouse,
                external_ref: None,
                priority: 0,
            },
        )
        .await
        .expect("create location")
        .id
}
