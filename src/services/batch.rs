use crate::context::RequestContext;
use crate::db::DbPool;
use crate::entities::stock_movement::{MovementDirection, MovementReason};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{locations, movements, stock_records};
use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One quantity delta in a bulk update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaLine {
    pub variant_id: Uuid,
    pub location_id: Uuid,
    pub delta: i64,
    pub reason: MovementReason,
    pub reference: Option<String>,
}

/// Structured failure entry: the absolute offset of the failing line (or
/// the starting offset of a failing chunk) and the raw payload that failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchErrorEntry {
    pub offset: usize,
    pub lines: Vec<DeltaLine>,
    pub message: String,
}

/// Aggregate outcome of a bulk update. Counts are per line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub success_count: u64,
    pub failed_count: u64,
    pub errors: Vec<BatchErrorEntry>,
}

struct ChunkOutcome {
    succeeded: u64,
    line_errors: Vec<BatchErrorEntry>,
}

/// Applies bulk quantity deltas in bounded-size transactional chunks.
///
/// Every chunk is always attempted; a failed chunk never aborts later
/// ones. Callers needing all-or-nothing semantics must provide their own
/// transaction boundary, which this coordinator does not offer across
/// chunks.
#[derive(Clone)]
pub struct BatchUpdateService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    chunk_size: usize,
}

impl BatchUpdateService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, chunk_size: usize) -> Self {
        Self {
            db,
            event_sender,
            chunk_size: chunk_size.max(1),
        }
    }

    #[instrument(skip(self, ctx, lines), fields(tenant_id = %ctx.tenant_id, request_id = %ctx.request_id, line_count = lines.len()))]
    pub async fn apply_deltas(
        &self,
        ctx: &RequestContext,
        lines: Vec<DeltaLine>,
    ) -> Result<BatchReport, ServiceError> {
        for (index, line) in lines.iter().enumerate() {
            if line.delta == 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Line {index}: delta must be non-zero"
                )));
            }
        }

        let mut report = BatchReport::default();
        for (chunk_index, chunk) in lines.chunks(self.chunk_size).enumerate() {
            let offset = chunk_index * self.chunk_size;
            let ctx_inner = ctx.clone();
            let chunk_lines = chunk.to_vec();

            let outcome = self
                .db
                .transaction::<_, ChunkOutcome, ServiceError>(move |txn| {
                    Box::pin(async move {
                        let mut succeeded = 0u64;
                        let mut line_errors = Vec::new();
                        for (index, line) in chunk_lines.iter().enumerate() {
                            match apply_line(txn, &ctx_inner, line).await {
                                Ok(()) => succeeded += 1,
                                // Domain failures are per line: recorded and
                                // skipped without poisoning the chunk.
                                Err(
                                    err @ (ServiceError::NotFound(_)
                                    | ServiceError::Conflict(_)
                                    | ServiceError::InvalidOperation(_)),
                                ) => {
                                    line_errors.push(BatchErrorEntry {
                                        offset: offset + index,
                                        lines: vec![line.clone()],
                                        message: err.to_string(),
                                    });
                                }
                                // Store failures roll the whole chunk back.
                                Err(err) => return Err(err),
                            }
                        }
                        Ok(ChunkOutcome {
                            succeeded,
                            line_errors,
                        })
                    })
                })
                .await
                .map_err(ServiceError::from);

            match outcome {
                Ok(outcome) => {
                    report.success_count += outcome.succeeded;
                    report.failed_count += outcome.line_errors.len() as u64;
                    report.errors.extend(outcome.line_errors);
                }
                Err(err) => {
                    warn!(
                        offset = offset,
                        chunk_len = chunk.len(),
                        error = %err,
                        "Batch chunk failed"
                    );
                    report.failed_count += chunk.len() as u64;
                    report.errors.push(BatchErrorEntry {
                        offset,
                        lines: chunk.to_vec(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            success_count = report.success_count,
            failed_count = report.failed_count,
            "Bulk delta batch processed"
        );
        self.event_sender
            .emit(Event::BatchApplied {
                tenant_id: ctx.tenant_id,
                success_count: report.success_count,
                failed_count: report.failed_count,
            })
            .await;
        Ok(report)
    }
}

async fn apply_line<C>(
    txn: &C,
    ctx: &RequestContext,
    line: &DeltaLine,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    locations::ensure_exists(txn, ctx.tenant_id, line.location_id).await?;

    let (_, applied) = stock_records::upsert_delta(
        txn,
        ctx.tenant_id,
        line.variant_id,
        line.location_id,
        line.delta,
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
            ctx,
            movements::NewMovement {
                variant_id: line.variant_id,
                location_id: line.location_id,
                direction,
                quantity: applied.abs(),
                reason: line.reason,
                reference: line.reference.clone(),
            },
        )
        .await?;
    }
    Ok(())
}
