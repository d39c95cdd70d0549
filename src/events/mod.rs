use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted after a mutating operation commits.
///
/// Emission is best-effort side logging: a full or closed channel is
/// logged and never fails the primary operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockAdjusted {
        tenant_id: Uuid,
        variant_id: Uuid,
        location_id: Uuid,
        delta: i64,
        new_on_hand: i64,
        reason: String,
    },
    StockReserved {
        tenant_id: Uuid,
        variant_id: Uuid,
        location_id: Uuid,
        order_id: Uuid,
        reservation_id: Uuid,
        quantity: i64,
    },
    ReservationsReleased {
        tenant_id: Uuid,
        order_id: Option<Uuid>,
        released_count: u64,
    },
    ReservationsExpired {
        tenant_id: Uuid,
        expired_count: u64,
    },
    ReservationsFulfilled {
        tenant_id: Uuid,
        order_id: Uuid,
        fulfilled_count: u64,
    },
    TransferCompleted {
        tenant_id: Uuid,
        transfer_id: Uuid,
        variant_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        quantity: i64,
    },
    BatchApplied {
        tenant_id: Uuid,
        success_count: u64,
        failed_count: u64,
    },
    LocationDeactivated {
        tenant_id: Uuid,
        location_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Builds a sender together with the receiving end for `process_events`.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event, surfacing delivery failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Best-effort emission used after commit; failures are logged only.
    pub async fn emit(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropped domain event");
        }
    }
}

/// Drains the event channel, logging each event. The surrounding service
/// replaces this with its own consumer (outbox, webhook fan-out, ...).
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = %payload, "Domain event"),
            Err(_) => info!(event = ?event, "Domain event"),
        }
    }
}
