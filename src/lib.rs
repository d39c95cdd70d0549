//! Multi-tenant inventory availability and reservation engine.
//!
//! Tracks physical stock per product-variant per location, derives how much
//! of that stock may be sold through each sales channel, and guarantees
//! that concurrent sell-side operations (order placement, cancellation,
//! transfer, manual adjustment) never oversell or corrupt the stock ledger.
//! All coordination is delegated to the transactional store, so the engine
//! runs safely as multiple stateless replicas.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod context;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

pub use context::RequestContext;
pub use errors::ServiceError;

use crate::config::EngineConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use services::availability::AvailabilityService;
use services::batch::BatchUpdateService;
use services::locations::LocationService;
use services::movements::MovementService;
use services::reservations::ReservationService;
use services::stock_records::StockRecordService;
use services::transfers::TransferService;
use std::sync::Arc;

/// The engine's in-process surface.
///
/// Collaborators are injected through the constructor; there is no global
/// registry and no process-wide state, so several engines (or tenants'
/// worth of calls through one engine) can run side by side.
#[derive(Clone)]
pub struct InventoryEngine {
    pub stock: StockRecordService,
    pub movements: MovementService,
    pub locations: LocationService,
    pub reservations: ReservationService,
    pub transfers: TransferService,
    pub availability: AvailabilityService,
    pub batch: BatchUpdateService,
}

impl InventoryEngine {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, config: &EngineConfig) -> Self {
        Self {
            stock: StockRecordService::new(db.clone(), event_sender.clone()),
            movements: MovementService::new(db.clone()),
            locations: LocationService::new(db.clone(), event_sender.clone()),
            reservations: ReservationService::new(
                db.clone(),
                event_sender.clone(),
                config.reservation_ttl_hours,
            ),
            transfers: TransferService::new(db.clone(), event_sender.clone()),
            availability: AvailabilityService::new(db.clone()),
            batch: BatchUpdateService::new(db, event_sender, config.batch_chunk_size),
        }
    }
}
