use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{DeliveryStatus, Order, OrderStatusType};

/// Fired whenever an order reaches one of the cancel-class terminal statuses, whichever path got it there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

/// Fired when a courier pickup attempt fails and the order enters the missed-pickup sub-flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupMissedEvent {
    pub order: Order,
    pub feedback: String,
}

impl PickupMissedEvent {
    pub fn new(order: Order, feedback: String) -> Self {
        Self { order, feedback }
    }
}

/// Fired when a seller successfully rebooks a missed pickup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupRescheduledEvent {
    pub order: Order,
    pub new_pickup_time: DateTime<Utc>,
}

impl PickupRescheduledEvent {
    pub fn new(order: Order, new_pickup_time: DateTime<Utc>) -> Self {
        Self { order, new_pickup_time }
    }
}

/// Fired when the reconciliation job observes the terminal `Delivered` status for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDeliveredEvent {
    pub order: Order,
    pub delivery_status: DeliveryStatus,
}

impl OrderDeliveredEvent {
    pub fn new(order: Order) -> Self {
        Self { order, delivery_status: DeliveryStatus::Delivered }
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    OrderAnnulled(OrderAnnulledEvent),
    PickupMissed(PickupMissedEvent),
    PickupRescheduled(PickupRescheduledEvent),
    OrderDelivered(OrderDeliveredEvent),
}
