//! Buyer cancellation and seller decline flows: compensation ordering, idempotence and the refund-before-terminal
//! invariant.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
};

use book_trade_engine::{
    db_types::{DeliveryStatus, OrderStatusType, RefundStatus},
    events::{EventHandler, EventProducers, OrderAnnulledEvent},
    test_utils::{make_order, FakeCourier, FakeGateway, MemoryOrderStore, RecordingNotifier},
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
async fn pre_commit_buyer_cancel_is_refund_only() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O2", OrderStatusType::PendingCommit, None);
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    let api = api(store.clone(), gateway.clone(), courier.clone(), notifier.clone());

    let cancelled = api.cancel_order_by_buyer(&oid, "found it cheaper").await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    assert_eq!(cancelled.delivery_status, Some(DeliveryStatus::Cancelled));
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("found it cheaper"));

    // full refund, and no courier interaction at all on the pre-commit path
    let refunds = gateway.refund_calls();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].0, "PAY-O2");
    assert_eq!(refunds[0].1, cancelled.total_amount);
    assert!(courier.cancel_calls().is_empty());

    let ledger = store.refunds();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].status, RefundStatus::Success);
    assert!(ledger[0].gateway_reference.is_some());

    // both parties notified
    assert_eq!(notifier.notify_count_for("buyer-1"), 1);
    assert_eq!(notifier.notify_count_for("seller-1"), 1);
}

#[tokio::test]
async fn double_cancel_issues_exactly_one_refund() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O10", OrderStatusType::PendingCommit, None);
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    let api = api(store.clone(), gateway.clone(), courier, notifier.clone());

    api.cancel_order_by_buyer(&oid, "first").await.unwrap();
    // the second call is a no-op returning success
    let again = api.cancel_order_by_buyer(&oid, "second").await.unwrap();
    assert_eq!(again.status, OrderStatusType::Cancelled);

    assert_eq!(gateway.refund_calls().len(), 1);
    assert_eq!(store.refunds().len(), 1);
    // notifications fired once, not twice
    assert_eq!(notifier.notify_count_for("buyer-1"), 1);
}

#[tokio::test]
async fn cancel_rejected_once_courier_has_the_parcel() {
    let _ = env_logger::try_init();
    // every state from collection to the doorstep, including a failed delivery attempt, blocks a buyer cancel
    for ds in [
        DeliveryStatus::Collected,
        DeliveryStatus::PickedUp,
        DeliveryStatus::InTransit,
        DeliveryStatus::OutForDelivery,
        DeliveryStatus::DeliveryFailed,
    ] {
        let store = MemoryOrderStore::new();
        let status = if ds == DeliveryStatus::Collected || ds == DeliveryStatus::PickedUp {
            OrderStatusType::Committed
        } else {
            OrderStatusType::Dispatched
        };
        let order = make_order("O11", status, Some(ds));
        let oid = order.order_id.clone();
        store.add_order(order);
        let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
        let api = api(store.clone(), gateway.clone(), courier, notifier);

        let result = api.cancel_order_by_buyer(&oid, "too slow").await;
        assert!(matches!(result, Err(OrderFlowError::InvalidTransition(_))), "cancel should be rejected from {ds}");
        // rejected before any side effect
        assert!(gateway.refund_calls().is_empty(), "no refund may be issued from {ds}");
        assert_eq!(store.get("O11").unwrap().status, status);
    }
}

#[tokio::test]
async fn refund_failure_aborts_the_cancellation() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O12", OrderStatusType::PendingCommit, None);
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::failing(), FakeCourier::new(), RecordingNotifier::new());
    let api = api(store.clone(), gateway.clone(), courier, notifier.clone());

    let result = api.cancel_order_by_buyer(&oid, "please").await;
    assert!(matches!(result, Err(OrderFlowError::CompensationFailed { .. })));

    // no terminal status without a confirmed refund
    let current = store.get("O12").unwrap();
    assert_eq!(current.status, OrderStatusType::PendingCommit);
    assert!(current.cancelled_at.is_none());
    let ledger = store.refunds();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].status, RefundStatus::Failed);
    // the failed attempt must not notify anyone
    assert!(notifier.notify_calls().is_empty());
}

#[tokio::test]
async fn committed_cancel_unwinds_the_courier_booking_first() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O13", OrderStatusType::Committed, Some(DeliveryStatus::PickupScheduled));
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    let api = api(store.clone(), gateway.clone(), courier.clone(), notifier);

    let cancelled = api.cancel_order_by_buyer(&oid, "changed my mind").await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    assert_eq!(courier.cancel_calls(), vec![("courier-guy".to_string(), "BK-O13".to_string())]);
    assert_eq!(gateway.refund_calls().len(), 1);
}

#[tokio::test]
async fn courier_cancel_failure_does_not_abort() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    let order = make_order("O14", OrderStatusType::Committed, Some(DeliveryStatus::PickupScheduled));
    let oid = order.order_id.clone();
    store.add_order(order);
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    courier.set_fail_cancel(true);
    let api = api(store.clone(), gateway.clone(), courier.clone(), notifier);

    // a stale courier booking is tolerable; a missing refund is not
    let cancelled = api.cancel_order_by_buyer(&oid, "changed my mind").await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    assert_eq!(courier.cancel_calls().len(), 1);
    assert_eq!(gateway.refund_calls().len(), 1);
}

#[tokio::test]
async fn decline_is_pre_commit_only() {
    let _ = env_logger::try_init();
    let store = MemoryOrderStore::new();
    store.add_order(make_order("O15", OrderStatusType::Committed, None));
    store.add_order(make_order("O16", OrderStatusType::PendingCommit, None));
    let (gateway, courier, notifier) = (FakeGateway::new(), FakeCourier::new(), RecordingNotifier::new());
    let api = api(store.clone(), gateway.clone(), courier, notifier);

    let result = api.decline_order(&"O15".parse().unwrap(), "sold elsewhere").await;
    assert!(matches!(result, Err(OrderFlowError::InvalidTransition(_))));

    let declined = api.decline_order(&"O16".parse().unwrap(), "sold elsewhere").await.unwrap();
    assert_eq!(declined.status, OrderStatusType::DeclinedBySeller);
    assert_eq!(declined.decline_reason.as_deref(), Some("sold elsewhere"));
    assert!(declined.declined_at.is_some());
    assert_eq!(gateway.refund_calls().len(), 1);
}

#[tokio::test]
async fn order_annulled_hook_fires_once() {
    let _ = env_logger::try_init();
    let counter = Arc::new(AtomicI32::new(0));
    let c2 = counter.clone();
    let handler = EventHandler::new(
        8,
        Arc::new(move |ev: OrderAnnulledEvent| {
            let c = c2.clone();
            Box::pin(async move {
                assert_eq!(ev.status, OrderStatusType::Cancelled);
                c.fetch_add(1, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        }),
    );
    let mut producers = EventProducers::default();
    producers.order_annulled_producer.push(handler.subscribe());
    let join = tokio::spawn(handler.start_handler());

    let store = MemoryOrderStore::new();
    let order = make_order("O17", OrderStatusType::PendingCommit, None);
    let oid = order.order_id.clone();
    store.add_order(order);
    let api = OrderFlowApi::new(
        store,
        FakeGateway::new(),
        FakeCourier::new(),
        RecordingNotifier::new(),
        producers,
    );
    api.cancel_order_by_buyer(&oid, "hook test").await.unwrap();
    // repeat no-op must not publish a second event
    api.cancel_order_by_buyer(&oid, "hook test").await.unwrap();
    drop(api);
    join.await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
