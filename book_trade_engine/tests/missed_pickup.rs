//! The missed-pickup sub-flow: recording the miss, rescheduling, cancelling afterwards, and the auto-cancel sweep.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Duration, Utc};
use book_trade_engine::{
    db_types::{
        DeliveryStatus,
        NewRefund,
        Order,
        OrderId,
        OrderStatusType,
        OrderUpdate,
        Refund,
        RefundStatus,
    },
    events::EventProducers,
    lifecycle::notifications::NotificationKind,
    test_utils::{make_order, FakeCourier, FakeGateway, MemoryOrderStore, RecordingNotifier},
    traits::{OrderStore, OrderStoreError},
    OrderFlowApi,
    OrderFlowError,
};

fn api(
    store: MemoryOrderStore,
    gateway: FakeGateway,
    courier: FakeCourier,
    notifier: RecordingNotifier,
) -> OrderFlowApi<MemoryOrderStore, FakeGateway, FakeCourier, RecordingNotifier> {
    OrderFlowApi::new(store, gateway, courier, notifier, EventProducers::default())
}

#[tokio::test]
async fn missed_pickup_is_recorded_once() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O20", OrderStatusType::Committed, Some(DeliveryStatus::PickupScheduled));
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    let api = api(store.clone(), gateway.clone(), courier.clone(), notifier.clone());

    let updated = api.handle_missed_pickup(&oid, "nobody home at the pickup address").await.unwrap();
    assert_eq!(updated.status, OrderStatusType::Committed);
    assert_eq!(updated.delivery_status, Some(DeliveryStatus::PickupFailed));
    assert!(updated.pickup_failed_at.is_some());
    // entering the sub-flow triggers neither refund nor courier cancellation
    assert!(gateway.refund_calls().is_empty());
    assert!(courier.cancel_calls().is_empty());
    assert_eq!(notifier.notify_count_for("seller-1"), 1);
    assert_eq!(notifier.notify_count_for("buyer-1"), 1);

    // the second report of the same attempt is a no-op
    let again = api.handle_missed_pickup(&oid, "still nobody home").await.unwrap();
    assert_eq!(again.delivery_status, Some(DeliveryStatus::PickupFailed));
    assert_eq!(notifier.notify_count_for("seller-1"), 1);
}

#[tokio::test]
async fn missed_pickup_requires_a_scheduled_pickup() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    store.add_order(make_order("O21", OrderStatusType::Dispatched, Some(DeliveryStatus::InTransit)));
    let api = api(store, FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());

    let result = api.handle_missed_pickup(&"O21".parse().unwrap(), "nobody home").await;
    assert!(matches!(result, Err(OrderFlowError::InvalidTransition(_))));
}

#[tokio::test]
async fn reschedule_happy_path() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O22", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed));
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    let api = api(store.clone(), gateway.clone(), courier.clone(), notifier.clone());

    let quote = api.reschedule_quote(&oid).await.unwrap();
    assert_eq!(quote.courier_service, "courier-guy");
    assert!(quote.reschedule_fee > btx_common::Cents::from(0));
    assert_eq!(quote.available_times.len(), 3);

    let new_time = quote.available_times[0];
    let updated = api.reschedule_pickup(&oid, new_time, "FEE-REF-22").await.unwrap();
    assert_eq!(updated.delivery_status, Some(DeliveryStatus::RescheduledBySeller));
    assert_eq!(updated.pickup_scheduled_at, Some(new_time));
    // the rebooking replaced the courier booking id
    assert_ne!(updated.courier_booking_id.as_deref(), Some("BK-O22"));

    assert_eq!(gateway.verify_calls(), vec!["FEE-REF-22".to_string()]);
    assert_eq!(courier.rebook_calls().len(), 1);
    assert_eq!(notifier.notify_count_for("seller-1"), 1);
    assert_eq!(notifier.notify_count_for("buyer-1"), 1);
}

#[tokio::test]
async fn unverified_fee_blocks_the_reschedule() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O23", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed));
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    gateway.set_verify_result(false);
    let api = api(store.clone(), gateway, courier.clone(), notifier);

    let result = api.reschedule_pickup(&oid, Utc::now() + Duration::days(1), "FEE-REF-23").await;
    assert!(matches!(result, Err(OrderFlowError::FeeNotVerified(_))));
    // the courier was never asked to rebook
    assert!(courier.rebook_calls().is_empty());
    assert_eq!(store.get("O23").unwrap().delivery_status, Some(DeliveryStatus::PickupFailed));
}

#[tokio::test]
async fn rebook_failure_leaves_the_order_untouched() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O24", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed));
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    courier.set_fail_rebook(true);
    let api = api(store.clone(), gateway, courier, notifier.clone());

    let result = api.reschedule_pickup(&oid, Utc::now() + Duration::days(1), "FEE-REF-24").await;
    assert!(matches!(result, Err(OrderFlowError::CompensationFailed { .. })));

    // the courier remains the source of truth; nothing was persisted and nobody was notified
    let current = store.get("O24").unwrap();
    assert_eq!(current.delivery_status, Some(DeliveryStatus::PickupFailed));
    assert_eq!(current.courier_booking_id.as_deref(), Some("BK-O24"));
    assert!(notifier.notify_calls().is_empty());
}

#[tokio::test]
async fn cancel_after_missed_pickup_refunds_and_unwinds_the_booking() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O25", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed));
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    let api = api(store.clone(), gateway.clone(), courier.clone(), notifier.clone());

    let cancelled = api.cancel_after_missed_pickup(&oid, "cannot make a new pickup work").await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::CancelledBySellerAfterMissedPickup);
    assert_eq!(cancelled.delivery_status, Some(DeliveryStatus::Cancelled));
    assert_eq!(courier.cancel_calls().len(), 1);
    assert_eq!(gateway.refund_calls().len(), 1);
    assert_eq!(store.refunds().len(), 1);
}

#[tokio::test]
async fn single_missed_pickup_does_not_warn_the_seller() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    store.add_order(make_order("O26", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed)));
    let notifier = RecordingNotifier::new();
    let api = api(store, FakeGateway::new(), FakeCourier::new(), notifier.clone());

    api.cancel_after_missed_pickup(&"O26".parse().unwrap(), "no luck").await.unwrap();
    let warnings = notifier
        .notify_calls()
        .iter()
        .filter(|(_, _, kind)| *kind == NotificationKind::SellerReliabilityWarning)
        .count();
    assert_eq!(warnings, 0);
}

#[tokio::test]
async fn repeated_missed_pickups_warn_the_seller() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    // two misses in the window for the same seller
    store.add_order(make_order("O27", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed)));
    store.add_order(make_order("O28", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed)));
    let notifier = RecordingNotifier::new();
    let api = api(store, FakeGateway::new(), FakeCourier::new(), notifier.clone());

    api.cancel_after_missed_pickup(&"O27".parse().unwrap(), "no luck").await.unwrap();
    let warnings: Vec<_> = notifier
        .notify_calls()
        .into_iter()
        .filter(|(_, _, kind)| *kind == NotificationKind::SellerReliabilityWarning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, "seller-1");
}

#[tokio::test]
async fn auto_cancel_sweeps_only_stale_failures() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let stale = make_order("O29", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed));
    let mut fresh = make_order("O30", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed));
    fresh.pickup_failed_at = Some(Utc::now());
    store.add_order(stale);
    store.add_order(fresh);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    let api = api(store.clone(), gateway.clone(), courier, notifier);

    // the stale order missed its pickup an hour ago; only it falls past a 30-minute window
    let result = api.auto_cancel_stale_pickup_failures(Duration::minutes(30)).await.unwrap();
    assert_eq!(result.cancelled, vec!["O29".parse::<OrderId>().unwrap()]);
    assert_eq!(result.skipped, 0);
    assert!(result.failed.is_empty());

    assert_eq!(store.get("O29").unwrap().status, OrderStatusType::CancelledBySellerAfterMissedPickup);
    assert_eq!(store.get("O30").unwrap().status, OrderStatusType::Committed);
    assert_eq!(gateway.refund_calls().len(), 1);

    // a second sweep finds nothing left to do
    let again = api.auto_cancel_stale_pickup_failures(Duration::minutes(30)).await.unwrap();
    assert!(again.cancelled.is_empty());
    assert_eq!(gateway.refund_calls().len(), 1);
}

/// Wraps the in-memory store and, the first time the sweep lists its candidates, flips one of them to a different
/// terminal state behind the sweep's back. This reproduces a seller (or buyer) acting in the window between the
/// listing and the guarded persist.
#[derive(Clone)]
struct RacingStore {
    inner: MemoryOrderStore,
    tripped: Arc<AtomicBool>,
}

impl OrderStore for RacingStore {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        self.inner.fetch_order_by_order_id(order_id).await
    }

    async fn update_order(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Order, OrderStoreError> {
        self.inner.update_order(order_id, update).await
    }

    async fn update_order_guarded(
        &self,
        order_id: &OrderId,
        expected_status: OrderStatusType,
        expected_delivery_status: Option<DeliveryStatus>,
        update: OrderUpdate,
    ) -> Result<Order, OrderStoreError> {
        self.inner.update_order_guarded(order_id, expected_status, expected_delivery_status, update).await
    }

    async fn list_open_deliveries(&self) -> Result<Vec<Order>, OrderStoreError> {
        self.inner.list_open_deliveries().await
    }

    async fn insert_refund(&self, refund: NewRefund) -> Result<Refund, OrderStoreError> {
        self.inner.insert_refund(refund).await
    }

    async fn fetch_successful_refund(&self, order_id: &OrderId) -> Result<Option<Refund>, OrderStoreError> {
        self.inner.fetch_successful_refund(order_id).await
    }

    async fn update_refund_status(
        &self,
        refund_id: i64,
        status: RefundStatus,
        gateway_reference: Option<String>,
    ) -> Result<Refund, OrderStoreError> {
        self.inner.update_refund_status(refund_id, status, gateway_reference).await
    }

    async fn count_missed_pickups_since(&self, seller_id: &str, since: DateTime<Utc>) -> Result<i64, OrderStoreError> {
        self.inner.count_missed_pickups_since(seller_id, since).await
    }

    async fn list_stale_pickup_failures(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError> {
        let stale = self.inner.list_stale_pickup_failures(cutoff).await?;
        if !self.tripped.swap(true, Ordering::SeqCst) {
            if let Some(order) = stale.first() {
                let update = OrderUpdate::default()
                    .with_status(OrderStatusType::Cancelled)
                    .with_delivery_status(DeliveryStatus::Cancelled)
                    .with_cancellation(Utc::now(), "buyer got there first");
                self.inner.update_order(&order.order_id, update).await?;
            }
        }
        Ok(stale)
    }
}

#[tokio::test]
async fn auto_cancel_skips_orders_actioned_concurrently() {
    let _ = env_logger::try_init();
    let inner = MemoryOrderStore::new();
    inner.add_order(make_order("O31", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed)));
    let store = RacingStore { inner: inner.clone(), tripped: Arc::new(AtomicBool::new(false)) };
    let api = OrderFlowApi::new(
        store,
        FakeGateway::new(),
        FakeCourier::new(),
        RecordingNotifier::new(),
        EventProducers::default(),
    );

    let result = api.auto_cancel_stale_pickup_failures(Duration::minutes(30)).await.unwrap();
    // losing the race is a skip, not a failure, and the winner's state stands
    assert!(result.cancelled.is_empty());
    assert_eq!(result.skipped, 1);
    assert!(result.failed.is_empty());
    assert_eq!(inner.get("O31").unwrap().status, OrderStatusType::Cancelled);
}
