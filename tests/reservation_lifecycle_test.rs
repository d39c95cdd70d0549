mod common;

use chrono::{Duration, Utc};
use inventory_engine::entities::reservation::ReservationStatus;
use inventory_engine::entities::stock_movement::MovementReason;
use inventory_engine::services::reservations::ReservationLine;
use inventory_engine::ServiceError;
use uuid::Uuid;

fn line(variant_id: Uuid, location_id: Uuid, quantity: i64, order_id: Uuid) -> ReservationLine {
    ReservationLine {
        variant_id,
        location_id,
        quantity,
        order_id,
        expires_at: None,
    }
}

#[tokio::test]
async fn reserve_then_shortfall_then_release() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();

    engine
        .stock
        .set_level(&ctx, variant, location, 5, MovementReason::Adjustment)
        .await
        .unwrap();

    let order1 = Uuid::new_v4();
    let results = engine
        .reservations
        .reserve(&ctx, vec![line(variant, location, 3, order1)])
        .await
        .unwrap();
    assert!(results[0].success);
    assert!(results[0].reservation_id.is_some());
    assert_eq!(results[0].available_quantity, 2);

    // Second order asks for more than is left: per-line failure, nothing
    // changes, and the message names the shortfall.
    let order2 = Uuid::new_v4();
    let results = engine
        .reservations
        .reserve(&ctx, vec![line(variant, location, 4, order2)])
        .await
        .unwrap();
    assert!(!results[0].success);
    assert_eq!(results[0].available_quantity, 2);
    assert_eq!(results[0].shortfall, Some(2));
    let message = results[0].error.as_deref().unwrap();
    assert!(message.contains("short 2"), "got: {message}");

    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.on_hand, 5, "reserving never touches on-hand");
    assert_eq!(record.reserved, 3);

    engine
        .reservations
        .release_by_order(&ctx, order1)
        .await
        .unwrap();
    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.reserved, 0);
    assert!(record.reserved <= record.on_hand);
}

#[tokio::test]
async fn batch_is_best_effort_not_all_or_nothing() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();

    engine
        .stock
        .set_level(&ctx, variant, location, 5, MovementReason::Adjustment)
        .await
        .unwrap();

    let order = Uuid::new_v4();
    let results = engine
        .reservations
        .reserve(
            &ctx,
            vec![
                line(variant, location, 3, order),
                line(variant, location, 4, order),
                line(variant, location, 2, order),
            ],
        )
        .await
        .unwrap();

    assert!(results[0].success);
    assert_eq!(results[0].available_quantity, 2);
    assert!(!results[1].success);
    assert_eq!(results[1].available_quantity, 2);
    assert!(results[2].success);
    assert_eq!(results[2].available_quantity, 0);

    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.reserved, 5);
    assert_eq!(record.on_hand, 5);
}

#[tokio::test]
async fn reserving_unknown_record_reports_zero_availability() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;

    let results = engine
        .reservations
        .reserve(
            &ctx,
            vec![line(Uuid::new_v4(), location, 1, Uuid::new_v4())],
        )
        .await
        .unwrap();
    assert!(!results[0].success);
    assert_eq!(results[0].available_quantity, 0);
    assert_eq!(results[0].shortfall, Some(1));
}

#[tokio::test]
async fn release_by_ids_is_idempotent() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();

    engine
        .stock
        .set_level(&ctx, variant, location, 4, MovementReason::Adjustment)
        .await
        .unwrap();

    let order = Uuid::new_v4();
    let results = engine
        .reservations
        .reserve(&ctx, vec![line(variant, location, 2, order)])
        .await
        .unwrap();
    let reservation_id = results[0].reservation_id.unwrap();

    let released = engine
        .reservations
        .release_by_ids(&ctx, &[reservation_id])
        .await
        .unwrap();
    assert_eq!(released, 1);

    // Same list again: no-op, same end state.
    let released = engine
        .reservations
        .release_by_ids(&ctx, &[reservation_id])
        .await
        .unwrap();
    assert_eq!(released, 0);

    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.reserved, 0);
    assert_eq!(record.on_hand, 4);

    let reservation = engine
        .reservations
        .get(&ctx, reservation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reservation.status(), Some(ReservationStatus::Cancelled));
    assert_eq!(reservation.quantity, 2, "stored quantity is immutable");

    // Unknown ids are skipped, not errors.
    let released = engine
        .reservations
        .release_by_ids(&ctx, &[Uuid::new_v4()])
        .await
        .unwrap();
    assert_eq!(released, 0);
}

#[tokio::test]
async fn expiry_sweep_only_touches_due_active_reservations() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();

    engine
        .stock
        .set_level(&ctx, variant, location, 10, MovementReason::Adjustment)
        .await
        .unwrap();

    let overdue_order = Uuid::new_v4();
    let fresh_order = Uuid::new_v4();
    let mut overdue = line(variant, location, 3, overdue_order);
    overdue.expires_at = Some(Utc::now() - Duration::hours(1));
    let fresh = line(variant, location, 2, fresh_order);

    engine
        .reservations
        .reserve(&ctx, vec![overdue, fresh])
        .await
        .unwrap();

    // An overdue-but-unswept reservation still holds stock.
    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.reserved, 5);

    let sweep = engine
        .reservations
        .expire_due(&ctx, Utc::now())
        .await
        .unwrap();
    assert_eq!(sweep.expired_count, 1);

    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.reserved, 2, "only the overdue hold was released");

    let statuses: Vec<_> = engine
        .reservations
        .list_for_order(&ctx, overdue_order)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.status().unwrap())
        .collect();
    assert_eq!(statuses, vec![ReservationStatus::Expired]);

    // Second sweep finds nothing.
    let sweep = engine
        .reservations
        .expire_due(&ctx, Utc::now())
        .await
        .unwrap();
    assert_eq!(sweep.expired_count, 0);
}

#[tokio::test]
async fn fulfillment_ships_held_units() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();

    engine
        .stock
        .set_level(&ctx, variant, location, 5, MovementReason::Adjustment)
        .await
        .unwrap();

    let order = Uuid::new_v4();
    engine
        .reservations
        .reserve(&ctx, vec![line(variant, location, 2, order)])
        .await
        .unwrap();

    let fulfilled = engine
        .reservations
        .fulfill_by_order(&ctx, order)
        .await
        .unwrap();
    assert_eq!(fulfilled, 1);

    let record = engine
        .stock
        .get_record(&ctx, variant, location)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.on_hand, 3);
    assert_eq!(record.reserved, 0);

    let reservations = engine
        .reservations
        .list_for_order(&ctx, order)
        .await
        .unwrap();
    assert_eq!(
        reservations[0].status(),
        Some(ReservationStatus::Fulfilled)
    );

    // Fulfilling again is a no-op; every state is terminal.
    let fulfilled = engine
        .reservations
        .fulfill_by_order(&ctx, order)
        .await
        .unwrap();
    assert_eq!(fulfilled, 0);
}

#[tokio::test]
async fn movement_log_records_every_mutation() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;
    let variant = Uuid::new_v4();

    engine
        .stock
        .set_level(&ctx, variant, location, 5, MovementReason::Adjustment)
        .await
        .unwrap();
    let order = Uuid::new_v4();
    let results = engine
        .reservations
        .reserve(&ctx, vec![line(variant, location, 3, order)])
        .await
        .unwrap();
    engine
        .reservations
        .release_by_ids(&ctx, &[results[0].reservation_id.unwrap()])
        .await
        .unwrap();

    let (movements, total) = engine
        .movements
        .list(&ctx, variant, Some(location), 1, 50)
        .await
        .unwrap();
    assert_eq!(total, 3);
    let mut reasons: Vec<_> = movements.iter().map(|m| m.reason.as_str()).collect();
    reasons.sort_unstable();
    assert_eq!(
        reasons,
        vec!["adjustment", "reservation", "reservation_released"]
    );
    // The reservation movements carry the order as their reference.
    assert!(movements
        .iter()
        .filter(|m| m.reason != "adjustment")
        .all(|m| m.reference.as_deref() == Some(order.to_string().as_str())));
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_transaction() {
    let engine = common::setup_engine().await;
    let ctx = common::test_ctx();
    let location = common::seed_location(&engine, &ctx, "Main Warehouse").await;

    let err = engine.reservations.reserve(&ctx, vec![]).await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let err = engine
        .reservations
        .reserve(
            &ctx,
            vec![line(Uuid::new_v4(), location, 0, Uuid::new_v4())],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}
