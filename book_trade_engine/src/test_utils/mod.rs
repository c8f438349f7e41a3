//! In-memory fakes for exercising the lifecycle engine without a database or network.
//!
//! Every fake records the calls made against it, so tests can assert not just on final state but on how many times a
//! side effect fired — which is the whole point of the idempotence guarantees.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use btx_common::Cents;
use chrono::{DateTime, Duration, Utc};

use crate::{
    db_types::{
        DeliveryInfo,
        DeliveryStatus,
        NewRefund,
        Order,
        OrderId,
        OrderStatusType,
        OrderUpdate,
        Refund,
        RefundStatus,
        RescheduleQuote,
    },
    lifecycle::notifications::NotificationKind,
    traits::{
        data_objects::{NewBooking, RefundReceipt, TrackingUpdate},
        CourierApi,
        CourierApiError,
        Notifier,
        NotifierError,
        OrderStore,
        OrderStoreError,
        PaymentGateway,
        PaymentGatewayError,
        PayoutProvisioner,
        PayoutProvisionerError,
    },
};

/// Build an order row with sensible defaults for tests. Courier fields are populated whenever a delivery status is
/// given.
pub fn make_order(oid: &str, status: OrderStatusType, delivery_status: Option<DeliveryStatus>) -> Order {
    let now = Utc::now();
    let has_delivery = delivery_status.is_some();
    Order {
        id: 1,
        order_id: OrderId(oid.to_string()),
        buyer_id: "buyer-1".to_string(),
        seller_id: "seller-1".to_string(),
        book_id: "book-1".to_string(),
        buyer_email: Some("buyer@example.com".to_string()),
        seller_email: Some("seller@example.com".to_string()),
        total_amount: Cents::from(25_000),
        payment_reference: format!("PAY-{oid}"),
        status,
        delivery_status,
        courier_service: has_delivery.then(|| "courier-guy".to_string()),
        courier_booking_id: has_delivery.then(|| format!("BK-{oid}")),
        tracking_number: has_delivery.then(|| format!("TRK-{oid}")),
        pickup_scheduled_at: has_delivery.then(|| now + Duration::days(1)),
        pickup_failed_at: (delivery_status == Some(DeliveryStatus::PickupFailed)).then(|| now - Duration::hours(1)),
        cancelled_at: None,
        cancellation_reason: None,
        declined_at: None,
        decline_reason: None,
        delivery_info: DeliveryInfo::default(),
        created_at: now - Duration::days(2),
        updated_at: now - Duration::hours(6),
    }
}

fn apply_update(order: &mut Order, update: OrderUpdate) {
    if let Some(status) = update.status {
        order.status = status;
    }
    if let Some(ds) = update.delivery_status {
        order.delivery_status = Some(ds);
    }
    if let Some(id) = update.courier_booking_id {
        order.courier_booking_id = Some(id);
    }
    if let Some(at) = update.pickup_scheduled_at {
        order.pickup_scheduled_at = Some(at);
    }
    if let Some(at) = update.pickup_failed_at {
        order.pickup_failed_at = Some(at);
    }
    if let Some(at) = update.cancelled_at {
        order.cancelled_at = Some(at);
    }
    if let Some(reason) = update.cancellation_reason {
        order.cancellation_reason = Some(reason);
    }
    if let Some(at) = update.declined_at {
        order.declined_at = Some(at);
    }
    if let Some(reason) = update.decline_reason {
        order.decline_reason = Some(reason);
    }
    if let Some(info) = update.delivery_info {
        order.delivery_info = info;
    }
    order.updated_at = Utc::now();
}

//--------------------------------------   MemoryOrderStore    -------------------------------------------------------
#[derive(Default)]
struct StoreInner {
    orders: HashMap<String, Order>,
    refunds: Vec<Refund>,
    next_refund_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: Vec<Order>) -> Self {
        let store = Self::new();
        for order in orders {
            store.add_order(order);
        }
        store
    }

    pub fn add_order(&self, order: Order) {
        let mut inner = self.inner.lock().unwrap();
        inner.orders.insert(order.order_id.0.clone(), order);
    }

    pub fn get(&self, oid: &str) -> Option<Order> {
        self.inner.lock().unwrap().orders.get(oid).cloned()
    }

    pub fn refunds(&self) -> Vec<Refund> {
        self.inner.lock().unwrap().refunds.clone()
    }
}

impl OrderStore for MemoryOrderStore {
    fn url(&self) -> &str {
        "memory://test"
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        Ok(self.inner.lock().unwrap().orders.get(&order_id.0).cloned())
    }

    async fn update_order(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Order, OrderStoreError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id.0)
            .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))?;
        apply_update(order, update);
        Ok(order.clone())
    }

    async fn update_order_guarded(
        &self,
        order_id: &OrderId,
        expected_status: OrderStatusType,
        expected_delivery_status: Option<DeliveryStatus>,
        update: OrderUpdate,
    ) -> Result<Order, OrderStoreError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id.0)
            .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))?;
        if order.status != expected_status || order.delivery_status != expected_delivery_status {
            return Err(OrderStoreError::StatusConflict {
                expected: format!("{expected_status}/{expected_delivery_status:?}"),
                actual: format!("{}/{:?}", order.status, order.delivery_status),
            });
        }
        apply_update(order, update);
        Ok(order.clone())
    }

    async fn list_open_deliveries(&self) -> Result<Vec<Order>, OrderStoreError> {
        let inner = self.inner.lock().unwrap();
        let mut open: Vec<Order> = inner.orders.values().filter(|o| o.has_open_delivery()).cloned().collect();
        open.sort_by(|a, b| a.order_id.0.cmp(&b.order_id.0));
        Ok(open)
    }

    async fn insert_refund(&self, refund: NewRefund) -> Result<Refund, OrderStoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(order) = inner.orders.get(&refund.order_id.0) {
            if refund.amount > order.total_amount {
                return Err(OrderStoreError::RefundExceedsTotal { amount: refund.amount, total: order.total_amount });
            }
        }
        if inner.refunds.iter().any(|r| r.order_id == refund.order_id && r.status == RefundStatus::Success) {
            return Err(OrderStoreError::RefundAlreadyIssued(refund.order_id.clone()));
        }
        inner.next_refund_id += 1;
        let now = Utc::now();
        let row = Refund {
            id: inner.next_refund_id,
            order_id: refund.order_id,
            payment_reference: refund.payment_reference,
            amount: refund.amount,
            reason: refund.reason,
            gateway_reference: None,
            status: RefundStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        inner.refunds.push(row.clone());
        Ok(row)
    }

    async fn fetch_successful_refund(&self, order_id: &OrderId) -> Result<Option<Refund>, OrderStoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.refunds.iter().find(|r| &r.order_id == order_id && r.status == RefundStatus::Success).cloned())
    }

    async fn update_refund_status(
        &self,
        refund_id: i64,
        status: RefundStatus,
        gateway_reference: Option<String>,
    ) -> Result<Refund, OrderStoreError> {
        let mut inner = self.inner.lock().unwrap();
        let refund = inner
            .refunds
            .iter_mut()
            .find(|r| r.id == refund_id)
            .ok_or(OrderStoreError::RefundNotFound(refund_id))?;
        refund.status = status;
        refund.gateway_reference = gateway_reference;
        refund.updated_at = Utc::now();
        Ok(refund.clone())
    }

    async fn count_missed_pickups_since(&self, seller_id: &str, since: DateTime<Utc>) -> Result<i64, OrderStoreError> {
        let inner = self.inner.lock().unwrap();
        let count = inner
            .orders
            .values()
            .filter(|o| o.seller_id == seller_id && o.pickup_failed_at.is_some_and(|at| at >= since))
            .count();
        Ok(count as i64)
    }

    async fn list_stale_pickup_failures(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError> {
        let inner = self.inner.lock().unwrap();
        let mut stale: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| {
                o.delivery_status == Some(DeliveryStatus::PickupFailed)
                    && o.pickup_failed_at.is_some_and(|at| at < cutoff)
            })
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.order_id.0.cmp(&b.order_id.0));
        Ok(stale)
    }
}

//--------------------------------------     FakeGateway       -------------------------------------------------------
#[derive(Default)]
struct GatewayInner {
    refund_calls: Vec<(String, Cents, String)>,
    verify_calls: Vec<String>,
    fail_refunds: bool,
    verify_result: Option<bool>,
}

#[derive(Clone, Default)]
pub struct FakeGateway {
    inner: Arc<Mutex<GatewayInner>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.inner.lock().unwrap().verify_result = Some(true);
        gateway
    }

    pub fn failing() -> Self {
        let gateway = Self::new();
        gateway.inner.lock().unwrap().fail_refunds = true;
        gateway
    }

    pub fn set_verify_result(&self, result: bool) {
        self.inner.lock().unwrap().verify_result = Some(result);
    }

    pub fn refund_calls(&self) -> Vec<(String, Cents, String)> {
        self.inner.lock().unwrap().refund_calls.clone()
    }

    pub fn verify_calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().verify_calls.clone()
    }
}

impl PaymentGateway for FakeGateway {
    async fn refund(&self, payment_ref: &str, amount: Cents, reason: &str) -> Result<RefundReceipt, PaymentGatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.refund_calls.push((payment_ref.to_string(), amount, reason.to_string()));
        if inner.fail_refunds {
            Err(PaymentGatewayError::Rejected("refund declined by gateway".to_string()))
        } else {
            Ok(RefundReceipt { gateway_reference: format!("RF-{}", inner.refund_calls.len()) })
        }
    }

    async fn verify(&self, payment_ref: &str) -> Result<bool, PaymentGatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.verify_calls.push(payment_ref.to_string());
        Ok(inner.verify_result.unwrap_or(true))
    }
}

//--------------------------------------     FakeCourier       -------------------------------------------------------
#[derive(Default)]
struct CourierInner {
    cancel_calls: Vec<(String, String)>,
    rebook_calls: Vec<(String, String, DateTime<Utc>)>,
    status_calls: Vec<String>,
    statuses: HashMap<String, TrackingUpdate>,
    failing_tracking_numbers: Vec<String>,
    fail_rebook: bool,
    fail_cancel: bool,
}

#[derive(Clone, Default)]
pub struct FakeCourier {
    inner: Arc<Mutex<CourierInner>>,
}

impl FakeCourier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status the courier will report for a tracking number.
    pub fn set_status(&self, tracking_number: &str, status: &str, description: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.statuses.insert(
            tracking_number.to_string(),
            TrackingUpdate { status: status.to_string(), description: description.to_string(), events: vec![] },
        );
    }

    /// Make status fetches for this tracking number fail.
    pub fn fail_status(&self, tracking_number: &str) {
        self.inner.lock().unwrap().failing_tracking_numbers.push(tracking_number.to_string());
    }

    pub fn set_fail_rebook(&self, fail: bool) {
        self.inner.lock().unwrap().fail_rebook = fail;
    }

    pub fn set_fail_cancel(&self, fail: bool) {
        self.inner.lock().unwrap().fail_cancel = fail;
    }

    pub fn cancel_calls(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().cancel_calls.clone()
    }

    pub fn rebook_calls(&self) -> Vec<(String, String, DateTime<Utc>)> {
        self.inner.lock().unwrap().rebook_calls.clone()
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().status_calls.clone()
    }
}

impl CourierApi for FakeCourier {
    async fn cancel_booking(&self, service: &str, booking_id: &str) -> Result<bool, CourierApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.cancel_calls.push((service.to_string(), booking_id.to_string()));
        if inner.fail_cancel {
            Err(CourierApiError::Unreachable("courier API timed out".to_string()))
        } else {
            Ok(true)
        }
    }

    async fn fetch_status(&self, tracking_number: &str) -> Result<TrackingUpdate, CourierApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.status_calls.push(tracking_number.to_string());
        if inner.failing_tracking_numbers.iter().any(|t| t == tracking_number) {
            return Err(CourierApiError::Unreachable("courier API timed out".to_string()));
        }
        inner
            .statuses
            .get(tracking_number)
            .cloned()
            .ok_or_else(|| CourierApiError::UnknownTrackingNumber(tracking_number.to_string()))
    }

    async fn rebook_pickup(
        &self,
        service: &str,
        booking_id: &str,
        new_time: DateTime<Utc>,
    ) -> Result<NewBooking, CourierApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.rebook_calls.push((service.to_string(), booking_id.to_string(), new_time));
        if inner.fail_rebook {
            Err(CourierApiError::Rejected("no capacity for the requested slot".to_string()))
        } else {
            Ok(NewBooking { booking_id: format!("{booking_id}-R{}", inner.rebook_calls.len()), pickup_time: new_time })
        }
    }

    async fn reschedule_quote(&self, service: &str) -> Result<RescheduleQuote, CourierApiError> {
        let now = Utc::now();
        Ok(RescheduleQuote {
            quote_id: format!("Q-{}", rand::random::<u32>()),
            courier_service: service.to_string(),
            reschedule_fee: Cents::from(5_000),
            available_times: vec![now + Duration::days(1), now + Duration::days(2), now + Duration::days(3)],
        })
    }
}

//--------------------------------------   RecordingNotifier   -------------------------------------------------------
#[derive(Default)]
struct NotifierInner {
    notify_calls: Vec<(String, String, NotificationKind)>,
    email_calls: Vec<(String, String)>,
    fail: bool,
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    inner: Arc<Mutex<NotifierInner>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose sends always fail (after being recorded). For exercising the best-effort contract.
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.inner.lock().unwrap().fail = true;
        notifier
    }

    pub fn notify_calls(&self) -> Vec<(String, String, NotificationKind)> {
        self.inner.lock().unwrap().notify_calls.clone()
    }

    pub fn email_calls(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().email_calls.clone()
    }

    pub fn notify_count_for(&self, user_id: &str) -> usize {
        self.inner.lock().unwrap().notify_calls.iter().filter(|(uid, _, _)| uid == user_id).count()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user_id: &str,
        title: &str,
        _message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifierError> {
        let mut inner = self.inner.lock().unwrap();
        inner.notify_calls.push((user_id.to_string(), title.to_string(), kind));
        if inner.fail {
            Err(NotifierError::DeliveryFailed("smtp unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    async fn email(
        &self,
        address: &str,
        subject: &str,
        _html_body: &str,
        _text_body: &str,
    ) -> Result<(), NotifierError> {
        let mut inner = self.inner.lock().unwrap();
        inner.email_calls.push((address.to_string(), subject.to_string()));
        if inner.fail {
            Err(NotifierError::DeliveryFailed("smtp unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

//--------------------------------------      FakePayout       -------------------------------------------------------
#[derive(Default)]
struct PayoutInner {
    calls: Vec<String>,
    fail: bool,
}

#[derive(Clone, Default)]
pub struct FakePayout {
    inner: Arc<Mutex<PayoutInner>>,
}

impl FakePayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let payout = Self::default();
        payout.inner.lock().unwrap().fail = true;
        payout
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }
}

impl PayoutProvisioner for FakePayout {
    async fn create_recipient(&self, seller_id: &str) -> Result<String, PayoutProvisionerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(seller_id.to_string());
        if inner.fail {
            Err(PayoutProvisionerError::ProvisioningFailed {
                seller_id: seller_id.to_string(),
                message: "banking details rejected".to_string(),
            })
        } else {
            Ok(format!("RCP_{}", inner.calls.len()))
        }
    }
}
