use std::{fmt::Display, str::FromStr};

use btx_common::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been paid for, and the seller has not yet committed to fulfilling it.
    PendingCommit,
    /// The seller has committed to the sale. A courier pickup may or may not have been arranged yet.
    Committed,
    /// The courier has the parcel and it is on its way to the buyer.
    Dispatched,
    /// Delivery is arranged, but the parcel has not been handed over yet.
    PendingDelivery,
    /// The courier has delivered the parcel to the buyer.
    Delivered,
    /// The order is fully complete, including payout to the seller.
    Completed,
    /// The buyer cancelled the order. Terminal.
    Cancelled,
    /// The seller declined the order before committing to it. Terminal.
    DeclinedBySeller,
    /// The seller cancelled the order after missing the courier pickup. Terminal.
    CancelledBySellerAfterMissedPickup,
}

impl OrderStatusType {
    /// True for every status that ends the order with a refund (the cancel-class statuses).
    pub fn is_cancel_class(&self) -> bool {
        matches!(
            self,
            OrderStatusType::Cancelled
                | OrderStatusType::DeclinedBySeller
                | OrderStatusType::CancelledBySellerAfterMissedPickup
        )
    }

    /// True when no further transition out of this status is legal.
    pub fn is_terminal(&self) -> bool {
        self.is_cancel_class() || matches!(self, OrderStatusType::Completed)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::PendingCommit => "PendingCommit",
            OrderStatusType::Committed => "Committed",
            OrderStatusType::Dispatched => "Dispatched",
            OrderStatusType::PendingDelivery => "PendingDelivery",
            OrderStatusType::Delivered => "Delivered",
            OrderStatusType::Completed => "Completed",
            OrderStatusType::Cancelled => "Cancelled",
            OrderStatusType::DeclinedBySeller => "DeclinedBySeller",
            OrderStatusType::CancelledBySellerAfterMissedPickup => "CancelledBySellerAfterMissedPickup",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PendingCommit" => Ok(Self::PendingCommit),
            "Committed" => Ok(Self::Committed),
            "Dispatched" => Ok(Self::Dispatched),
            "PendingDelivery" => Ok(Self::PendingDelivery),
            "Delivered" => Ok(Self::Delivered),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "DeclinedBySeller" => Ok(Self::DeclinedBySeller),
            "CancelledBySellerAfterMissedPickup" => Ok(Self::CancelledBySellerAfterMissedPickup),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    DeliveryStatus     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// A courier booking exists but nothing has happened yet.
    Created,
    /// The booking is waiting for a pickup slot.
    Pending,
    /// A pickup has been scheduled with the courier.
    PickupScheduled,
    /// The courier has collected the parcel from the seller.
    Collected,
    /// Synonym state reported by some couriers for collection.
    PickedUp,
    /// The parcel is moving through the courier network.
    InTransit,
    /// The parcel is on a vehicle for final delivery.
    OutForDelivery,
    /// The parcel has been delivered to the buyer. Terminal.
    Delivered,
    /// The courier attempted the pickup and it failed. Lateral state; recoverable via reschedule.
    PickupFailed,
    /// The seller rebooked the pickup after a failed attempt.
    RescheduledBySeller,
    /// The courier attempted delivery and it failed.
    DeliveryFailed,
    /// The parcel was returned to the seller. Terminal.
    Returned,
    /// The booking was cancelled. Terminal.
    Cancelled,
}

impl DeliveryStatus {
    /// True once the courier physically has (or had) the parcel. This covers the whole stretch from collection through
    /// final delivery, including a failed delivery attempt where the parcel stays on the vehicle. Buyer cancellation
    /// is no longer possible from any of these states.
    pub fn in_courier_possession(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Collected |
                DeliveryStatus::PickedUp |
                DeliveryStatus::InTransit |
                DeliveryStatus::OutForDelivery |
                DeliveryStatus::DeliveryFailed |
                DeliveryStatus::Delivered
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Returned | DeliveryStatus::Cancelled)
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryStatus::Created => "Created",
            DeliveryStatus::Pending => "Pending",
            DeliveryStatus::PickupScheduled => "PickupScheduled",
            DeliveryStatus::Collected => "Collected",
            DeliveryStatus::PickedUp => "PickedUp",
            DeliveryStatus::InTransit => "InTransit",
            DeliveryStatus::OutForDelivery => "OutForDelivery",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::PickupFailed => "PickupFailed",
            DeliveryStatus::RescheduledBySeller => "RescheduledBySeller",
            DeliveryStatus::DeliveryFailed => "DeliveryFailed",
            DeliveryStatus::Returned => "Returned",
            DeliveryStatus::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DeliveryStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Pending" => Ok(Self::Pending),
            "PickupScheduled" => Ok(Self::PickupScheduled),
            "Collected" => Ok(Self::Collected),
            "PickedUp" => Ok(Self::PickedUp),
            "InTransit" => Ok(Self::InTransit),
            "OutForDelivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            "PickupFailed" => Ok(Self::PickupFailed),
            "RescheduledBySeller" => Ok(Self::RescheduledBySeller),
            "DeliveryFailed" => Ok(Self::DeliveryFailed),
            "Returned" => Ok(Self::Returned),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid delivery status: {s}"))),
        }
    }
}

//--------------------------------------    TrackingEvent      -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

//--------------------------------------     DeliveryInfo      -------------------------------------------------------
/// The typed view over the order's courier metadata blob.
///
/// Only the fields the lifecycle engine reads and writes are modelled explicitly. Anything else the upstream services
/// stuff into the blob rides along untouched in `extra`. The event list is append-only; reconciliation cycles add to
/// it and never rewrite history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_courier_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<TrackingEvent>,
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeliveryInfo {
    pub fn record_check(&mut self, courier_status: &str, at: DateTime<Utc>) {
        self.last_courier_status = Some(courier_status.to_string());
        self.last_checked_at = Some(at);
    }

    pub fn append_events(&mut self, events: &[TrackingEvent]) {
        for ev in events {
            if !self.events.contains(ev) {
                self.events.push(ev.clone());
            }
        }
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub book_id: String,
    pub buyer_email: Option<String>,
    pub seller_email: Option<String>,
    pub total_amount: Cents,
    pub payment_reference: String,
    pub status: OrderStatusType,
    pub delivery_status: Option<DeliveryStatus>,
    pub courier_service: Option<String>,
    pub courier_booking_id: Option<String>,
    pub tracking_number: Option<String>,
    pub pickup_scheduled_at: Option<DateTime<Utc>>,
    pub pickup_failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub declined_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub delivery_info: DeliveryInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// True when a courier booking exists that would need cancelling as part of a compensation.
    pub fn has_courier_booking(&self) -> bool {
        self.courier_booking_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// True when the order has an open delivery that the reconciliation job should poll.
    pub fn has_open_delivery(&self) -> bool {
        self.tracking_number.as_deref().is_some_and(|t| !t.is_empty())
            && self.delivery_status.map_or(false, |ds| !ds.is_terminal())
    }
}

//--------------------------------------      OrderUpdate      -------------------------------------------------------
/// A partial update to an order row. Only fields that are `Some` are written.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatusType>,
    pub delivery_status: Option<DeliveryStatus>,
    pub courier_booking_id: Option<String>,
    pub pickup_scheduled_at: Option<DateTime<Utc>>,
    pub pickup_failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub declined_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub delivery_info: Option<DeliveryInfo>,
}

impl OrderUpdate {
    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_delivery_status(mut self, status: DeliveryStatus) -> Self {
        self.delivery_status = Some(status);
        self
    }

    pub fn with_courier_booking_id<S: Into<String>>(mut self, id: S) -> Self {
        self.courier_booking_id = Some(id.into());
        self
    }

    pub fn with_pickup_scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.pickup_scheduled_at = Some(at);
        self
    }

    pub fn with_pickup_failed_at(mut self, at: DateTime<Utc>) -> Self {
        self.pickup_failed_at = Some(at);
        self
    }

    pub fn with_cancellation<S: Into<String>>(mut self, at: DateTime<Utc>, reason: S) -> Self {
        self.cancelled_at = Some(at);
        self.cancellation_reason = Some(reason.into());
        self
    }

    pub fn with_decline<S: Into<String>>(mut self, at: DateTime<Utc>, reason: S) -> Self {
        self.declined_at = Some(at);
        self.decline_reason = Some(reason.into());
        self
    }

    pub fn with_delivery_info(mut self, info: DeliveryInfo) -> Self {
        self.delivery_info = Some(info);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.delivery_status.is_none()
            && self.courier_booking_id.is_none()
            && self.pickup_scheduled_at.is_none()
            && self.pickup_failed_at.is_none()
            && self.cancelled_at.is_none()
            && self.cancellation_reason.is_none()
            && self.declined_at.is_none()
            && self.decline_reason.is_none()
            && self.delivery_info.is_none()
    }
}

//--------------------------------------      RefundStatus     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundStatus {
    Pending,
    Success,
    Failed,
}

impl Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundStatus::Pending => write!(f, "Pending"),
            RefundStatus::Success => write!(f, "Success"),
            RefundStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for RefundStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid refund status: {s}"))),
        }
    }
}

//--------------------------------------        Refund         -------------------------------------------------------
/// A row in the refund ledger.
///
/// There is at most one `Success` refund per order, its amount never exceeds the order total, and a successful row is
/// never mutated again.
#[derive(Debug, Clone)]
pub struct Refund {
    pub id: i64,
    pub order_id: OrderId,
    pub payment_reference: String,
    pub amount: Cents,
    pub reason: String,
    pub gateway_reference: Option<String>,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefund {
    pub order_id: OrderId,
    pub payment_reference: String,
    pub amount: Cents,
    pub reason: String,
}

impl NewRefund {
    pub fn new(order: &Order, reason: &str) -> Self {
        Self {
            order_id: order.order_id.clone(),
            payment_reference: order.payment_reference.clone(),
            amount: order.total_amount,
            reason: reason.to_string(),
        }
    }
}

//--------------------------------------    RescheduleQuote    -------------------------------------------------------
/// A fee + candidate-times offer for rebooking a missed pickup. Ephemeral; consumed by a single reschedule call and
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleQuote {
    pub quote_id: String,
    pub courier_service: String,
    pub reschedule_fee: Cents,
    pub available_times: Vec<DateTime<Utc>>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            "PendingCommit",
            "Committed",
            "Dispatched",
            "PendingDelivery",
            "Delivered",
            "Completed",
            "Cancelled",
            "DeclinedBySeller",
            "CancelledBySellerAfterMissedPickup",
        ] {
            let status: OrderStatusType = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("NotAStatus".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn delivery_status_round_trips() {
        for s in ["Created", "PickupScheduled", "PickedUp", "InTransit", "OutForDelivery", "Delivered", "PickupFailed"]
        {
            let status: DeliveryStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("Teleported".parse::<DeliveryStatus>().is_err());
    }

    #[test]
    fn courier_possession_guard_set() {
        assert!(DeliveryStatus::PickedUp.in_courier_possession());
        assert!(DeliveryStatus::Collected.in_courier_possession());
        assert!(DeliveryStatus::InTransit.in_courier_possession());
        assert!(DeliveryStatus::OutForDelivery.in_courier_possession());
        assert!(DeliveryStatus::DeliveryFailed.in_courier_possession());
        assert!(DeliveryStatus::Delivered.in_courier_possession());
        assert!(!DeliveryStatus::PickupScheduled.in_courier_possession());
        assert!(!DeliveryStatus::PickupFailed.in_courier_possession());
    }

    #[test]
    fn delivery_info_appends_without_duplicates() {
        let mut info = DeliveryInfo::default();
        let ev = TrackingEvent {
            status: "IN_TRANSIT".into(),
            description: "Parcel at JHB hub".into(),
            timestamp: Utc::now(),
            location: Some("Johannesburg".into()),
        };
        info.append_events(&[ev.clone()]);
        info.append_events(&[ev.clone()]);
        assert_eq!(info.events.len(), 1);
    }
}
