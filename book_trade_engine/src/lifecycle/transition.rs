//! Pure transition planning for the order state machine.
//!
//! Every mutation of an order's `status`/`delivery_status` pair starts here. The planner looks only at the order row
//! it is given and produces either a rejection, an idempotent no-op, or a [`TransitionPlan`] describing what must
//! happen: the compensations to run first (in a fixed order), the fields to persist, and the notifications to fan out
//! once the write has landed. The caller is responsible for re-fetching the row before planning and for persisting
//! through the guarded update, so concurrent callers converge instead of double-applying side effects.
use chrono::{DateTime, Utc};

use crate::{
    db_types::{DeliveryStatus, Order, OrderStatusType, OrderUpdate},
    lifecycle::{
        errors::OrderFlowError,
        notifications::{NotificationIntent, NotificationKind, Recipient},
    },
    traits::data_objects::TrackingUpdate,
};

/// Who asked for a cancel-class transition. Decides the terminal status, the reason fields and the notification copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelInitiator {
    Buyer,
    SellerDecline,
    SellerAfterMissedPickup,
    /// The scheduler cancelling a stale missed pickup on the seller's behalf.
    Auto,
}

impl CancelInitiator {
    pub fn terminal_status(&self) -> OrderStatusType {
        match self {
            CancelInitiator::Buyer => OrderStatusType::Cancelled,
            CancelInitiator::SellerDecline => OrderStatusType::DeclinedBySeller,
            CancelInitiator::SellerAfterMissedPickup | CancelInitiator::Auto => {
                OrderStatusType::CancelledBySellerAfterMissedPickup
            },
        }
    }
}

/// A compensating action that must succeed (or be tolerated) before the new state may be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// Cancel the courier booking. Best-effort: a stale booking is correctable, so failure is logged, not fatal.
    CancelCourierBooking { service: String, booking_id: String },
    /// Issue the refund. Mandatory: an order is never marked cancelled without a confirmed refund.
    IssueRefund,
}

#[derive(Debug, Clone)]
pub struct TransitionPlan {
    /// The status pair the row must still hold at persist time (optimistic concurrency guard).
    pub expected_status: OrderStatusType,
    pub expected_delivery_status: Option<DeliveryStatus>,
    pub update: OrderUpdate,
    pub compensations: Vec<Compensation>,
    pub notifications: Vec<NotificationIntent>,
}

/// The planner's verdict: either nothing to do (the transition already happened) or a plan to execute.
#[derive(Debug, Clone)]
pub enum Planned {
    Noop,
    Apply(TransitionPlan),
}

//-------------------------------------- Cancellation planning -------------------------------------------------------

/// Plan a cancel-class transition (buyer cancel, seller decline, cancel after missed pickup).
pub fn plan_cancellation(
    order: &Order,
    initiator: CancelInitiator,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Planned, OrderFlowError> {
    let target = initiator.terminal_status();
    // a repeat transition into the same terminal state is a no-op returning success
    if order.status == target {
        return Ok(Planned::Noop);
    }
    check_cancellation_guards(order, initiator)?;

    let mut update = OrderUpdate::default().with_status(target).with_delivery_status(DeliveryStatus::Cancelled);
    update = match initiator {
        CancelInitiator::SellerDecline => update.with_decline(now, reason),
        _ => update.with_cancellation(now, reason),
    };

    let mut compensations = Vec::new();
    if let (Some(service), Some(booking_id)) = (&order.courier_service, &order.courier_booking_id) {
        if order.has_courier_booking() {
            compensations.push(Compensation::CancelCourierBooking {
                service: service.clone(),
                booking_id: booking_id.clone(),
            });
        }
    }
    compensations.push(Compensation::IssueRefund);

    let notifications = cancellation_notifications(order, initiator);
    Ok(Planned::Apply(TransitionPlan {
        expected_status: order.status,
        expected_delivery_status: order.delivery_status,
        update,
        compensations,
        notifications,
    }))
}

fn check_cancellation_guards(order: &Order, initiator: CancelInitiator) -> Result<(), OrderFlowError> {
    if order.status.is_terminal() {
        return Err(OrderFlowError::InvalidTransition(format!(
            "order {} is already finalised as {}",
            order.order_id, order.status
        )));
    }
    match initiator {
        CancelInitiator::Buyer => {
            if order.status == OrderStatusType::Delivered {
                return Err(OrderFlowError::InvalidTransition(format!(
                    "order {} has already been delivered",
                    order.order_id
                )));
            }
            if order.delivery_status.is_some_and(|ds| ds.in_courier_possession()) {
                return Err(OrderFlowError::InvalidTransition(format!(
                    "order {} cannot be cancelled once the courier has the parcel (delivery status {})",
                    order.order_id,
                    order.delivery_status.map(|d| d.to_string()).unwrap_or_default()
                )));
            }
        },
        CancelInitiator::SellerDecline => {
            if order.status != OrderStatusType::PendingCommit {
                return Err(OrderFlowError::InvalidTransition(format!(
                    "order {} can no longer be declined; the seller has already committed",
                    order.order_id
                )));
            }
        },
        CancelInitiator::SellerAfterMissedPickup | CancelInitiator::Auto => {
            if order.delivery_status != Some(DeliveryStatus::PickupFailed) {
                return Err(OrderFlowError::InvalidTransition(format!(
                    "order {} is not in the missed-pickup state",
                    order.order_id
                )));
            }
        },
    }
    Ok(())
}

fn cancellation_notifications(order: &Order, initiator: CancelInitiator) -> Vec<NotificationIntent> {
    let oid = &order.order_id;
    let amount = order.total_amount;
    match initiator {
        CancelInitiator::Buyer => vec![
            NotificationIntent::new(
                Recipient::buyer(order),
                NotificationKind::OrderCancelled,
                "Your order has been cancelled",
                format!("Order {oid} has been cancelled and a refund of {amount} has been issued to your card."),
            ),
            NotificationIntent::new(
                Recipient::seller(order),
                NotificationKind::OrderCancelled,
                "Order cancelled by buyer",
                format!("The buyer cancelled order {oid}. No further action is needed from you."),
            ),
        ],
        CancelInitiator::SellerDecline => vec![
            NotificationIntent::new(
                Recipient::buyer(order),
                NotificationKind::OrderDeclined,
                "Your order was declined",
                format!("The seller declined order {oid}. A full refund of {amount} has been issued to your card."),
            ),
            NotificationIntent::new(
                Recipient::seller(order),
                NotificationKind::OrderDeclined,
                "Order declined",
                format!("You declined order {oid}. The buyer has been refunded in full."),
            ),
        ],
        CancelInitiator::SellerAfterMissedPickup => vec![
            NotificationIntent::new(
                Recipient::buyer(order),
                NotificationKind::OrderCancelled,
                "Your order has been cancelled",
                format!(
                    "Order {oid} was cancelled after the courier pickup could not be completed. A full refund of \
                     {amount} has been issued to your card."
                ),
            ),
            NotificationIntent::new(
                Recipient::seller(order),
                NotificationKind::OrderCancelled,
                "Order cancelled after missed pickup",
                format!("You cancelled order {oid} after the missed pickup. The buyer has been refunded in full."),
            ),
        ],
        CancelInitiator::Auto => vec![
            NotificationIntent::new(
                Recipient::buyer(order),
                NotificationKind::OrderCancelled,
                "Your order has been cancelled",
                format!(
                    "Order {oid} was cancelled because the seller did not rebook the missed courier pickup in time. A \
                     full refund of {amount} has been issued to your card."
                ),
            ),
            NotificationIntent::new(
                Recipient::seller(order),
                NotificationKind::OrderCancelled,
                "Order automatically cancelled",
                format!(
                    "Order {oid} was automatically cancelled because the missed pickup was not rebooked in time. The \
                     buyer has been refunded in full."
                ),
            ),
        ],
    }
}

//-------------------------------------- Missed-pickup planning ------------------------------------------------------

/// Plan the entry into the missed-pickup sub-flow. Fires at most once per pickup attempt.
pub fn plan_missed_pickup(order: &Order, feedback: &str, now: DateTime<Utc>) -> Result<Planned, OrderFlowError> {
    if order.delivery_status == Some(DeliveryStatus::PickupFailed) {
        return Ok(Planned::Noop);
    }
    if order.delivery_status != Some(DeliveryStatus::PickupScheduled) {
        return Err(OrderFlowError::InvalidTransition(format!(
            "order {} has no scheduled pickup to miss (delivery status {:?})",
            order.order_id, order.delivery_status
        )));
    }

    let mut info = order.delivery_info.clone();
    info.record_check("COLLECTION_FAILED", now);
    info.append_events(&[crate::db_types::TrackingEvent {
        status: "COLLECTION_FAILED".to_string(),
        description: feedback.to_string(),
        timestamp: now,
        location: None,
    }]);
    let update = OrderUpdate::default()
        .with_delivery_status(DeliveryStatus::PickupFailed)
        .with_pickup_failed_at(now)
        .with_delivery_info(info);

    let oid = &order.order_id;
    let notifications = vec![
        NotificationIntent::new(
            Recipient::seller(order),
            NotificationKind::PickupMissed,
            "Action required: courier pickup missed",
            format!(
                "The courier could not collect order {oid} ({feedback}). Please reschedule the pickup or cancel the \
                 order."
            ),
        ),
        NotificationIntent::new(
            Recipient::buyer(order),
            NotificationKind::PickupMissed,
            "Your order is delayed",
            format!("The courier could not collect order {oid} from the seller. We are arranging a new pickup."),
        ),
    ];

    Ok(Planned::Apply(TransitionPlan {
        expected_status: order.status,
        expected_delivery_status: order.delivery_status,
        update,
        compensations: Vec::new(),
        notifications,
    }))
}

/// Plan the recovery from a missed pickup once the courier has confirmed a rebooking. The caller supplies the new
/// booking id after the rebook call has succeeded; rebook failure never reaches this point.
pub fn plan_reschedule(
    order: &Order,
    new_booking_id: &str,
    new_time: DateTime<Utc>,
) -> Result<Planned, OrderFlowError> {
    if order.delivery_status != Some(DeliveryStatus::PickupFailed) {
        return Err(OrderFlowError::InvalidTransition(format!(
            "order {} is not awaiting a reschedule (delivery status {:?})",
            order.order_id, order.delivery_status
        )));
    }
    let update = OrderUpdate::default()
        .with_delivery_status(DeliveryStatus::RescheduledBySeller)
        .with_courier_booking_id(new_booking_id)
        .with_pickup_scheduled_at(new_time);

    let oid = &order.order_id;
    let when = new_time.format("%A %e %B, %H:%M");
    let notifications = vec![
        NotificationIntent::new(
            Recipient::seller(order),
            NotificationKind::PickupRescheduled,
            "Pickup rescheduled",
            format!("The courier pickup for order {oid} has been rebooked for {when}."),
        ),
        NotificationIntent::new(
            Recipient::buyer(order),
            NotificationKind::PickupRescheduled,
            "Your order is back on track",
            format!("A new courier pickup for order {oid} has been arranged for {when}."),
        ),
    ];

    Ok(Planned::Apply(TransitionPlan {
        expected_status: order.status,
        expected_delivery_status: order.delivery_status,
        update,
        compensations: Vec::new(),
        notifications,
    }))
}

//-------------------------------------- Tracking update planning ----------------------------------------------------

/// Plan the persistence of a courier-reported delivery status change.
///
/// Returns `Noop` when the mapped status equals the current one, which is what makes repeated polls idempotent. A
/// `COLLECTION_FAILED` report routes through the same field set as a manually reported missed pickup; the order's own
/// status is only touched when the delivery goes terminal (`Delivered`).
pub fn plan_delivery_update(
    order: &Order,
    mapped: DeliveryStatus,
    tracking: &TrackingUpdate,
    now: DateTime<Utc>,
) -> Planned {
    if order.delivery_status == Some(mapped) {
        return Planned::Noop;
    }

    let mut info = order.delivery_info.clone();
    info.record_check(&tracking.status, now);
    info.append_events(&tracking.events);

    let mut update = OrderUpdate::default().with_delivery_status(mapped).with_delivery_info(info);
    let oid = &order.order_id;
    let notifications = match mapped {
        DeliveryStatus::PickupFailed => {
            update = update.with_pickup_failed_at(now);
            vec![
                NotificationIntent::new(
                    Recipient::seller(order),
                    NotificationKind::PickupMissed,
                    "Action required: courier pickup missed",
                    format!(
                        "The courier could not collect order {oid} ({}). Please reschedule the pickup or cancel the \
                         order.",
                        tracking.description
                    ),
                ),
                NotificationIntent::new(
                    Recipient::buyer(order),
                    NotificationKind::PickupMissed,
                    "Your order is delayed",
                    format!("The courier could not collect order {oid} from the seller. We are arranging a new pickup."),
                ),
            ]
        },
        DeliveryStatus::Delivered => {
            update = update.with_status(OrderStatusType::Delivered);
            vec![
                NotificationIntent::new(
                    Recipient::buyer(order),
                    NotificationKind::OrderDelivered,
                    "Your order has been delivered",
                    format!("Order {oid} has been delivered. Enjoy your book!"),
                ),
                NotificationIntent::new(
                    Recipient::seller(order),
                    NotificationKind::OrderDelivered,
                    "Order delivered",
                    format!("Order {oid} has been delivered to the buyer. Your payout is being prepared."),
                ),
            ]
        },
        other => vec![NotificationIntent::new(
            Recipient::buyer(order),
            NotificationKind::DeliveryUpdate,
            "Delivery update",
            format!("Order {oid} is now: {}", delivery_update_copy(other, &tracking.description)),
        )],
    };

    Planned::Apply(TransitionPlan {
        expected_status: order.status,
        expected_delivery_status: order.delivery_status,
        update,
        compensations: Vec::new(),
        notifications,
    })
}

fn delivery_update_copy(status: DeliveryStatus, description: &str) -> String {
    let headline = match status {
        DeliveryStatus::Collected | DeliveryStatus::PickedUp => "collected from the seller",
        DeliveryStatus::InTransit => "in transit",
        DeliveryStatus::OutForDelivery => "out for delivery",
        DeliveryStatus::DeliveryFailed => "delayed after a failed delivery attempt",
        DeliveryStatus::Returned => "returned to the seller",
        other => return format!("{other}"),
    };
    if description.is_empty() {
        headline.to_string()
    } else {
        format!("{headline} ({description})")
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::test_utils::make_order;

    #[test]
    fn buyer_cancel_rejected_once_courier_has_parcel() {
        for ds in [
            DeliveryStatus::PickedUp,
            DeliveryStatus::Collected,
            DeliveryStatus::InTransit,
            DeliveryStatus::OutForDelivery,
            DeliveryStatus::DeliveryFailed,
            DeliveryStatus::Delivered,
        ] {
            let order = make_order("O1", OrderStatusType::Committed, Some(ds));
            let result = plan_cancellation(&order, CancelInitiator::Buyer, "changed my mind", Utc::now());
            assert!(
                matches!(result, Err(OrderFlowError::InvalidTransition(_))),
                "cancel should be rejected from {ds}"
            );
        }
    }

    #[test]
    fn buyer_cancel_allowed_before_pickup() {
        for ds in [None, Some(DeliveryStatus::PickupScheduled), Some(DeliveryStatus::PickupFailed)] {
            let order = make_order("O1", OrderStatusType::Committed, ds);
            let planned = plan_cancellation(&order, CancelInitiator::Buyer, "changed my mind", Utc::now()).unwrap();
            assert!(matches!(planned, Planned::Apply(_)), "cancel should be allowed from {ds:?}");
        }
    }

    #[test]
    fn repeat_cancel_is_a_noop() {
        let order = make_order("O1", OrderStatusType::Cancelled, Some(DeliveryStatus::Cancelled));
        let planned = plan_cancellation(&order, CancelInitiator::Buyer, "again", Utc::now()).unwrap();
        assert!(matches!(planned, Planned::Noop));
    }

    #[test]
    fn cancel_into_a_different_terminal_state_is_rejected() {
        let order = make_order("O1", OrderStatusType::DeclinedBySeller, Some(DeliveryStatus::Cancelled));
        let result = plan_cancellation(&order, CancelInitiator::Buyer, "too late", Utc::now());
        assert!(matches!(result, Err(OrderFlowError::InvalidTransition(_))));
    }

    #[test]
    fn decline_only_before_commitment() {
        let order = make_order("O1", OrderStatusType::Committed, None);
        let result = plan_cancellation(&order, CancelInitiator::SellerDecline, "sold elsewhere", Utc::now());
        assert!(matches!(result, Err(OrderFlowError::InvalidTransition(_))));

        let order = make_order("O1", OrderStatusType::PendingCommit, None);
        let planned = plan_cancellation(&order, CancelInitiator::SellerDecline, "sold elsewhere", Utc::now()).unwrap();
        let Planned::Apply(plan) = planned else { panic!("expected a plan") };
        assert_eq!(plan.update.status, Some(OrderStatusType::DeclinedBySeller));
        assert!(plan.update.decline_reason.is_some());
        // pre-commit: refund only, no courier interaction
        assert_eq!(plan.compensations, vec![Compensation::IssueRefund]);
    }

    #[test]
    fn committed_order_with_booking_cancels_courier_first() {
        let mut order = make_order("O1", OrderStatusType::Committed, Some(DeliveryStatus::PickupScheduled));
        order.courier_service = Some("courier-guy".into());
        order.courier_booking_id = Some("BK-123".into());
        let planned = plan_cancellation(&order, CancelInitiator::Buyer, "changed my mind", Utc::now()).unwrap();
        let Planned::Apply(plan) = planned else { panic!("expected a plan") };
        assert_eq!(plan.compensations.len(), 2);
        assert!(matches!(plan.compensations[0], Compensation::CancelCourierBooking { .. }));
        assert_eq!(plan.compensations[1], Compensation::IssueRefund);
    }

    #[test]
    fn missed_pickup_only_from_scheduled() {
        let order = make_order("O1", OrderStatusType::Committed, Some(DeliveryStatus::InTransit));
        assert!(plan_missed_pickup(&order, "nobody home", Utc::now()).is_err());

        let order = make_order("O1", OrderStatusType::Committed, Some(DeliveryStatus::PickupFailed));
        assert!(matches!(plan_missed_pickup(&order, "nobody home", Utc::now()).unwrap(), Planned::Noop));

        let order = make_order("O1", OrderStatusType::Committed, Some(DeliveryStatus::PickupScheduled));
        let Planned::Apply(plan) = plan_missed_pickup(&order, "nobody home", Utc::now()).unwrap() else {
            panic!("expected a plan")
        };
        assert_eq!(plan.update.delivery_status, Some(DeliveryStatus::PickupFailed));
        assert!(plan.update.pickup_failed_at.is_some());
        assert!(plan.compensations.is_empty());
        assert_eq!(plan.notifications.len(), 2);
    }

    #[test]
    fn delivery_update_noop_when_status_unchanged() {
        let order = make_order("O1", OrderStatusType::Committed, Some(DeliveryStatus::InTransit));
        let tracking = TrackingUpdate { status: "IN_TRANSIT".into(), description: "At hub".into(), events: vec![] };
        let planned = plan_delivery_update(&order, DeliveryStatus::InTransit, &tracking, Utc::now());
        assert!(matches!(planned, Planned::Noop));
    }

    #[test]
    fn delivered_update_also_moves_order_status() {
        let order = make_order("O1", OrderStatusType::Dispatched, Some(DeliveryStatus::OutForDelivery));
        let tracking = TrackingUpdate { status: "DELIVERED".into(), description: "Left at door".into(), events: vec![] };
        let Planned::Apply(plan) = plan_delivery_update(&order, DeliveryStatus::Delivered, &tracking, Utc::now())
        else {
            panic!("expected a plan")
        };
        assert_eq!(plan.update.status, Some(OrderStatusType::Delivered));
        assert_eq!(plan.update.delivery_status, Some(DeliveryStatus::Delivered));
        assert_eq!(plan.notifications.len(), 2);
    }
}
