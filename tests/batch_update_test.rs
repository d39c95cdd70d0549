mod common;

use inventory_engine::entities::stock_movement::MovementReason;
use inventory_engine::services::batch::DeltaLine;
use inventory_engine::services::reservations::ReservationLine;
use inventory_engine::ServiceError;
use uuid::Uuid;

fn delta(variant_id: Uuid, location_id: Uuid, delta: i64) -> DeltaLine {
    DeltaLine {
        variant_id,
        location_id,
        delta,
        reason: MovementReason::Adjustment,
        reference: Some("import-42".to_string()),
    }
}

#[tokio::test]
async fn mixed_validity_batch_reports_per_line() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();
    let bogus_location = Uuid::new_v4();

    let lines = vec![
        delta(variant, location, 5),
        delta(variant, bogus_location, 3),
    ];
    let report = engine.batch.apply_deltas(&ctx, lines).await.unwrap();

    assert_eq!(report.success_count, 1);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.errors.len(), 1);
    let entry = &report.errors[0];
    assert_eq!(entry.offset, 1);
    assert_eq!(entry.lines.len(), 1);
    assert_eq!(entry.lines[0].location_id, bogus_location);
    assert!(entry.message.contains("not found"));

    // The valid line landed.
    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.on_hand, 5);
}

#[tokio::test]
async fn all_chunks_are_attempted() {
    let engine = common::setup_engine_with(|config| config.batch_chunk_size = 2).await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;

    // Five lines over chunk size two: three chunks, the bad line in the
    // middle chunk must not stop the last one.
    let variants: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    let lines = vec![
        delta(variants[0], location, 1),
        delta(variants[1], location, 2),
        delta(variants[2], Uuid::new_v4(), 3),
        delta(variants[3], location, 4),
        delta(variants[4], location, 5),
    ];
    let report = engine.batch.apply_deltas(&ctx, lines).await.unwrap();

    assert_eq!(report.success_count, 4);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.errors[0].offset, 2);

    let record = engine
        .stock
        .get_record(&ctx, variants[4], location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.on_hand, 5);
}

#[tokio::test]
async fn negative_deltas_clamp_at_zero_and_log_applied_quantity() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();

    engine
        .stock
        .set_level(&ctx, variant, location, 3, MovementReason::Adjustment)
        .await
        .unwrap();

    let report = engine
        .batch
        .apply_deltas(&ctx, vec![delta(variant, location, -10)])
        .await
        .unwrap();
    assert_eq!(report.success_count, 1);

    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.on_hand, 0, "negative on-hand is never observable");

    // The movement row records the applied quantity, not the requested one.
    let (movements, _) = engine
        .movements
        .list(&ctx, variant, Some(location), 1, 10)
        .await
        .unwrap();
    let out_movement = movements
        .iter()
        .find(|m| m.direction == "out")
        .expect("clamped decrement still produces a movement");
    assert_eq!(out_movement.quantity, 3);
}

#[tokio::test]
async fn decrement_below_reserved_fails_that_line() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();

    engine
        .stock
        .set_level(&ctx, variant, location, 5, MovementReason::Adjustment)
        .await
        .unwrap();
    engine
        .reservations
        .reserve(
            &ctx,
            vec![ReservationLine {
                variant_id: variant,
                location_id: location,
                quantity: 3,
                order_id: Uuid::new_v4(),
                expires_at: None,
            }],
        )
        .await
        .unwrap();

    // Dropping on-hand to 1 would strand 3 reserved units.
    let report = engine
        .batch
        .apply_deltas(&ctx, vec![delta(variant, location, -4)])
        .await
        .unwrap();
    assert_eq!(report.success_count, 0);
    assert_eq!(report.failed_count, 1);
    assert!(report.errors[0].message.contains("reserved"));

    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.on_hand, 5);
    assert_eq!(record.reserved, 3);
}

#[tokio::test]
async fn zero_delta_rejects_whole_request_before_any_change() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();

    let err = engine
        .batch
        .apply_deltas(
            &ctx,
            vec![delta(variant, location, 5), delta(variant, location, 0)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    assert!(engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn empty_batch_is_an_empty_report() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();

    let report = engine.batch.apply_deltas(&ctx, vec![]).await.unwrap();
    assert_eq!(report.success_count, 0);
    assert_eq!(report.failed_count, 0);
    assert!(report.errors.is_empty());
}
