//! The SQLite implementation of [`OrderStore`].
//!
//! All queries are runtime-bound; the guarded update is a single conditional `UPDATE ... WHERE` whose row count
//! distinguishes "won the race" from "lost it", which is all the optimistic concurrency the engine needs.
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{
    sqlite::{SqlitePoolOptions, SqliteRow},
    QueryBuilder,
    Row,
    SqlitePool,
};

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
    },
    traits::{OrderStore, OrderStoreError},
};

const TERMINAL_DELIVERY_STATUSES: [&str; 3] = ["Delivered", "Returned", "Cancelled"];

#[derive(Clone)]
pub struct SqliteOrderStore {
    url: String,
    pool: SqlitePool,
}

impl SqliteOrderStore {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, OrderStoreError> {
        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), OrderStoreError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrderStoreError::DatabaseError(e.to_string()))?;
        info!("🗃️ Order store migrations complete");
        Ok(())
    }
}

fn order_from_row(row: &SqliteRow) -> Result<Order, OrderStoreError> {
    let status: String = row.try_get("status")?;
    let status =
        OrderStatusType::from_str(&status).map_err(|e| OrderStoreError::DatabaseError(e.to_string()))?;
    let delivery_status: Option<String> = row.try_get("delivery_status")?;
    let delivery_status = delivery_status
        .map(|s| DeliveryStatus::from_str(&s))
        .transpose()
        .map_err(|e| OrderStoreError::DatabaseError(e.to_string()))?;
    let delivery_info: String = row.try_get("delivery_info")?;
    let delivery_info: DeliveryInfo =
        serde_json::from_str(&delivery_info).map_err(|e| OrderStoreError::DatabaseError(e.to_string()))?;
    let order_id: String = row.try_get("order_id")?;
    Ok(Order {
        id: row.try_get("id")?,
        order_id: OrderId(order_id),
        buyer_id: row.try_get("buyer_id")?,
        seller_id: row.try_get("seller_id")?,
        book_id: row.try_get("book_id")?,
        buyer_email: row.try_get("buyer_email")?,
        seller_email: row.try_get("seller_email")?,
        total_amount: row.try_get("total_amount")?,
        payment_reference: row.try_get("payment_reference")?,
        status,
        delivery_status,
        courier_service: row.try_get("courier_service")?,
        courier_booking_id: row.try_get("courier_booking_id")?,
        tracking_number: row.try_get("tracking_number")?,
        pickup_scheduled_at: row.try_get("pickup_scheduled_at")?,
        pickup_failed_at: row.try_get("pickup_failed_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        declined_at: row.try_get("declined_at")?,
        decline_reason: row.try_get("decline_reason")?,
        delivery_info,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn refund_from_row(row: &SqliteRow) -> Result<Refund, OrderStoreError> {
    let status: String = row.try_get("status")?;
    let status = RefundStatus::from_str(&status).map_err(|e| OrderStoreError::DatabaseError(e.to_string()))?;
    let order_id: String = row.try_get("order_id")?;
    Ok(Refund {
        id: row.try_get("id")?,
        order_id: OrderId(order_id),
        payment_reference: row.try_get("payment_reference")?,
        amount: row.try_get("amount")?,
        reason: row.try_get("reason")?,
        gateway_reference: row.try_get("gateway_reference")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Push the update's SET clauses onto the builder. Returns false if the update would be empty.
fn push_update_fields(builder: &mut QueryBuilder<'_, sqlx::Sqlite>, update: &OrderUpdate) -> bool {
    if update.is_empty() {
        return false;
    }
    let mut separated = builder.separated(", ");
    if let Some(status) = update.status {
        separated.push("status = ").push_bind_unseparated(status.to_string());
    }
    if let Some(ds) = update.delivery_status {
        separated.push("delivery_status = ").push_bind_unseparated(ds.to_string());
    }
    if let Some(id) = &update.courier_booking_id {
        separated.push("courier_booking_id = ").push_bind_unseparated(id.clone());
    }
    if let Some(at) = update.pickup_scheduled_at {
        separated.push("pickup_scheduled_at = ").push_bind_unseparated(at);
    }
    if let Some(at) = update.pickup_failed_at {
        separated.push("pickup_failed_at = ").push_bind_unseparated(at);
    }
    if let Some(at) = update.cancelled_at {
        separated.push("cancelled_at = ").push_bind_unseparated(at);
    }
    if let Some(reason) = &update.cancellation_reason {
        separated.push("cancellation_reason = ").push_bind_unseparated(reason.clone());
    }
    if let Some(at) = update.declined_at {
        separated.push("declined_at = ").push_bind_unseparated(at);
    }
    if let Some(reason) = &update.decline_reason {
        separated.push("decline_reason = ").push_bind_unseparated(reason.clone());
    }
    if let Some(info) = &update.delivery_info {
        let json = serde_json::to_string(info).unwrap_or_else(|_| "{}".to_string());
        separated.push("delivery_info = ").push_bind_unseparated(json);
    }
    separated.push("updated_at = CURRENT_TIMESTAMP");
    true
}

impl OrderStore for SqliteOrderStore {
    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_id = ? LIMIT 1")
            .bind(order_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn update_order(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Order, OrderStoreError> {
        let mut builder = QueryBuilder::new("UPDATE orders SET ");
        if !push_update_fields(&mut builder, &update) {
            return self
                .fetch_order_by_order_id(order_id)
                .await?
                .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()));
        }
        builder.push(" WHERE order_id = ").push_bind(order_id.as_str());
        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(OrderStoreError::OrderNotFound(order_id.clone()));
        }
        self.fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))
    }

    async fn update_order_guarded(
        &self,
        order_id: &OrderId,
        expected_status: OrderStatusType,
        expected_delivery_status: Option<DeliveryStatus>,
        update: OrderUpdate,
    ) -> Result<Order, OrderStoreError> {
        let mut builder = QueryBuilder::new("UPDATE orders SET ");
        if !push_update_fields(&mut builder, &update) {
            return self
                .fetch_order_by_order_id(order_id)
                .await?
                .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()));
        }
        builder.push(" WHERE order_id = ").push_bind(order_id.as_str());
        builder.push(" AND status = ").push_bind(expected_status.to_string());
        match expected_delivery_status {
            Some(ds) => {
                builder.push(" AND delivery_status = ").push_bind(ds.to_string());
            },
            None => {
                builder.push(" AND delivery_status IS NULL");
            },
        }
        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            // nothing matched: either the order is gone or another writer changed the status pair first
            let current = self
                .fetch_order_by_order_id(order_id)
                .await?
                .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))?;
            trace!("🗃️ Guarded update of {order_id} lost the race. Row is now {}", current.status);
            return Err(OrderStoreError::StatusConflict {
                expected: format!("{expected_status}/{expected_delivery_status:?}"),
                actual: format!("{}/{:?}", current.status, current.delivery_status),
            });
        }
        self.fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))
    }

    async fn list_open_deliveries(&self) -> Result<Vec<Order>, OrderStoreError> {
        let mut builder = QueryBuilder::new(
            "SELECT * FROM orders WHERE tracking_number IS NOT NULL AND tracking_number != '' AND delivery_status IS \
             NOT NULL AND delivery_status NOT IN (",
        );
        let mut separated = builder.separated(", ");
        for status in TERMINAL_DELIVERY_STATUSES {
            separated.push_bind(status);
        }
        builder.push(") ORDER BY order_id");
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn insert_refund(&self, refund: NewRefund) -> Result<Refund, OrderStoreError> {
        let order = self
            .fetch_order_by_order_id(&refund.order_id)
            .await?
            .ok_or_else(|| OrderStoreError::OrderNotFound(refund.order_id.clone()))?;
        if refund.amount > order.total_amount {
            return Err(OrderStoreError::RefundExceedsTotal { amount: refund.amount, total: order.total_amount });
        }
        if self.fetch_successful_refund(&refund.order_id).await?.is_some() {
            return Err(OrderStoreError::RefundAlreadyIssued(refund.order_id.clone()));
        }
        let row = sqlx::query(
            "INSERT INTO refunds (order_id, payment_reference, amount, reason) VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(refund.order_id.as_str())
        .bind(&refund.payment_reference)
        .bind(refund.amount)
        .bind(&refund.reason)
        .fetch_one(&self.pool)
        .await?;
        refund_from_row(&row)
    }

    async fn fetch_successful_refund(&self, order_id: &OrderId) -> Result<Option<Refund>, OrderStoreError> {
        let row = sqlx::query("SELECT * FROM refunds WHERE order_id = ? AND status = 'Success' LIMIT 1")
            .bind(order_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(refund_from_row).transpose()
    }

    async fn update_refund_status(
        &self,
        refund_id: i64,
        status: RefundStatus,
        gateway_reference: Option<String>,
    ) -> Result<Refund, OrderStoreError> {
        // successful refunds are immutable; the status guard enforces it at the row level
        let row = sqlx::query(
            "UPDATE refunds SET status = ?, gateway_reference = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND \
             status = 'Pending' RETURNING *",
        )
        .bind(status.to_string())
        .bind(gateway_reference)
        .bind(refund_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => refund_from_row(&row),
            None => Err(OrderStoreError::RefundNotFound(refund_id)),
        }
    }

    async fn count_missed_pickups_since(&self, seller_id: &str, since: DateTime<Utc>) -> Result<i64, OrderStoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM orders WHERE seller_id = ? AND pickup_failed_at >= ?")
            .bind(seller_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn list_stale_pickup_failures(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE delivery_status = 'PickupFailed' AND pickup_failed_at < ? ORDER BY order_id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn close(&mut self) -> Result<(), OrderStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
