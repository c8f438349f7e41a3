use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{DeliveryStatus, NewRefund, Order, OrderId, OrderStatusType, OrderUpdate, Refund, RefundStatus};

/// The persistent store behind the lifecycle engine.
///
/// The store exclusively owns durable state. The engine holds nothing between calls, which is what makes every
/// operation retryable: it re-reads the current order row before deciding a transition, and persists through the
/// guarded update so that concurrent writers converge instead of double-applying side effects.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Clone {
    /// The URL or identifier of the backing store, for logging.
    fn url(&self) -> &str;

    /// Fetch the current order row. Returns `Ok(None)` if no such order exists.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    /// Apply a partial update to the order unconditionally and return the updated row.
    async fn update_order(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Order, OrderStoreError>;

    /// Apply a partial update only if the row still carries the expected status pair.
    ///
    /// This is the optimistic-concurrency primitive every transition persists through. If another writer got there
    /// first the update must not be applied, and [`OrderStoreError::StatusConflict`] is returned so the caller can
    /// re-read and retry (or discover the transition already happened).
    async fn update_order_guarded(
        &self,
        order_id: &OrderId,
        expected_status: OrderStatusType,
        expected_delivery_status: Option<DeliveryStatus>,
        update: OrderUpdate,
    ) -> Result<Order, OrderStoreError>;

    /// All orders with an open delivery: a tracking number is present and the delivery status is not terminal.
    async fn list_open_deliveries(&self) -> Result<Vec<Order>, OrderStoreError>;

    /// Insert a refund ledger row with `Pending` status and return it.
    async fn insert_refund(&self, refund: NewRefund) -> Result<Refund, OrderStoreError>;

    /// The successful refund for this order, if one exists. At most one can.
    async fn fetch_successful_refund(&self, order_id: &OrderId) -> Result<Option<Refund>, OrderStoreError>;

    /// Promote a pending refund row to `Success` or `Failed`, recording the gateway reference if there is one.
    async fn update_refund_status(
        &self,
        refund_id: i64,
        status: RefundStatus,
        gateway_reference: Option<String>,
    ) -> Result<Refund, OrderStoreError>;

    /// How many pickups this seller has missed since the given instant. Feeds the advisory reliability check.
    async fn count_missed_pickups_since(&self, seller_id: &str, since: DateTime<Utc>) -> Result<i64, OrderStoreError>;

    /// Orders sitting in `PickupFailed` since before the cutoff, i.e. candidates for auto-cancellation.
    async fn list_stale_pickup_failures(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError>;

    /// Closes the store connection.
    async fn close(&mut self) -> Result<(), OrderStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The order no longer matches the expected state. Expected {expected}, found {actual}")]
    StatusConflict { expected: String, actual: String },
    #[error("The requested refund record (id {0}) does not exist")]
    RefundNotFound(i64),
    #[error("Refund amount {amount} exceeds the order total {total}")]
    RefundExceedsTotal { amount: btx_common::Cents, total: btx_common::Cents },
    #[error("A successful refund already exists for order {0}")]
    RefundAlreadyIssued(OrderId),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}
