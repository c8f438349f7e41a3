use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db_types::{DeliveryStatus, NewRefund, Order, OrderId, RefundStatus, RescheduleQuote},
    events::{EventProducers, OrderAnnulledEvent, PickupMissedEvent, PickupRescheduledEvent},
    lifecycle::{
        errors::OrderFlowError,
        notifications::{dispatch_notifications, NotificationIntent, NotificationKind, Recipient},
        transition::{plan_cancellation, plan_missed_pickup, plan_reschedule, CancelInitiator, Planned},
    },
    traits::{CourierApi, Notifier, OrderStore, OrderStoreError, PaymentGateway},
};

/// Number of missed pickups in the trailing window at which the advisory reliability warning fires.
pub const RELIABILITY_WARNING_THRESHOLD: i64 = 2;
/// The trailing window for the seller reliability check.
pub const RELIABILITY_WINDOW_DAYS: i64 = 30;

/// The outcome of an auto-cancel sweep over stale missed pickups.
#[derive(Debug, Clone, Default)]
pub struct AutoCancelResult {
    pub cancelled: Vec<OrderId>,
    /// Orders where a concurrent manual action won the race. Not an error.
    pub skipped: usize,
    pub failed: Vec<(OrderId, String)>,
}

/// `OrderFlowApi` is the primary API for order lifecycle mutations: buyer/seller cancellation, seller decline, the
/// missed-pickup sub-flow and the reschedule flow.
///
/// It is stateless between calls. Every operation re-fetches the current order row before deciding anything, runs its
/// compensations in a fixed order (courier-cancel, then refund), persists through the store's guarded update, and
/// only then fans out notifications, so concurrent or repeated calls converge rather than double-applying side
/// effects.
pub struct OrderFlowApi<S, G, C, N> {
    store: S,
    gateway: G,
    courier: C,
    notifier: N,
    producers: EventProducers,
}

impl<S, G, C, N> Debug for OrderFlowApi<S, G, C, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<S, G, C, N> OrderFlowApi<S, G, C, N> {
    pub fn new(store: S, gateway: G, courier: C, notifier: N, producers: EventProducers) -> Self {
        Self { store, gateway, courier, notifier, producers }
    }
}

impl<S, G, C, N> OrderFlowApi<S, G, C, N>
where
    S: OrderStore,
    G: PaymentGateway,
    C: CourierApi,
    N: Notifier,
{
    /// Buyer-initiated cancellation.
    ///
    /// Orders the seller has not committed to yet short-circuit to a refund-only path; there is no courier booking to
    /// unwind. Committed orders run the full compensation plan, which cancels the courier booking first when one
    /// exists. Re-invoking on an already-cancelled order is a no-op that returns success.
    pub async fn cancel_order_by_buyer(&self, oid: &OrderId, reason: &str) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(oid).await?;
        debug!("🚫️📦️ Buyer cancellation requested for order {oid} (status {})", order.status);
        self.execute_cancellation(order, CancelInitiator::Buyer, reason).await
    }

    /// Seller-initiated decline. Only legal before commitment, which the planner enforces; the refund+notify contract
    /// is identical to a buyer cancel, only the notification copy differs.
    pub async fn decline_order(&self, oid: &OrderId, reason: &str) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(oid).await?;
        debug!("🚫️📦️ Seller decline requested for order {oid} (status {})", order.status);
        self.execute_cancellation(order, CancelInitiator::SellerDecline, reason).await
    }

    /// Enter the missed-pickup sub-flow after the courier reported a failed collection attempt.
    ///
    /// Guarded to fire only once per attempt: a repeat call while the order is already in `PickupFailed` is a no-op.
    /// No refund and no courier cancellation happen here; the seller still gets to choose between rescheduling and
    /// cancelling.
    pub async fn handle_missed_pickup(&self, oid: &OrderId, feedback: &str) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(oid).await?;
        let planned = plan_missed_pickup(&order, feedback, Utc::now())?;
        let plan = match planned {
            Planned::Noop => {
                debug!("📦️❗️ Order {oid} is already marked as a missed pickup; nothing to do");
                return Ok(order);
            },
            Planned::Apply(plan) => plan,
        };
        let updated = match self
            .store
            .update_order_guarded(oid, plan.expected_status, plan.expected_delivery_status, plan.update)
            .await
        {
            Ok(o) => o,
            Err(OrderStoreError::StatusConflict { .. }) => {
                let current = self.fetch_order(oid).await?;
                if current.delivery_status == Some(DeliveryStatus::PickupFailed) {
                    debug!("📦️❗️ Order {oid} was concurrently marked as a missed pickup");
                    return Ok(current);
                }
                return Err(OrderFlowError::Conflict(format!("order {oid} changed while recording the missed pickup")));
            },
            Err(e) => return Err(e.into()),
        };
        info!("📦️❗️ Order {oid} marked as missed pickup: {feedback}");
        dispatch_notifications(&self.notifier, &plan.notifications).await;
        self.call_pickup_missed_hook(&updated, feedback).await;
        Ok(updated)
    }

    /// Quote the fee and candidate pickup slots for rebooking a missed pickup. Ephemeral; nothing is persisted.
    pub async fn reschedule_quote(&self, oid: &OrderId) -> Result<RescheduleQuote, OrderFlowError> {
        let order = self.fetch_order(oid).await?;
        if order.delivery_status != Some(DeliveryStatus::PickupFailed) {
            return Err(OrderFlowError::InvalidTransition(format!("order {oid} is not awaiting a reschedule")));
        }
        let service = order
            .courier_service
            .as_deref()
            .ok_or_else(|| OrderFlowError::InvalidTransition(format!("order {oid} has no courier service on record")))?;
        // quote fetches are read-only, so one retry is safe
        let quote = match self.courier.reschedule_quote(service).await {
            Ok(q) => q,
            Err(e) => {
                debug!("📦️🔁️ Quote fetch for order {oid} failed ({e}); retrying once");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                self.courier.reschedule_quote(service).await?
            },
        };
        Ok(quote)
    }

    /// Rebook the pickup at the chosen time, after the seller paid the reschedule fee out-of-band.
    ///
    /// The fee payment is verified with the gateway first; the rebook call itself is a financial mutation and is
    /// never retried automatically. A rebook failure aborts with no state change — the courier remains the source of
    /// truth for bookings.
    pub async fn reschedule_pickup(
        &self,
        oid: &OrderId,
        new_time: DateTime<Utc>,
        fee_payment_ref: &str,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(oid).await?;
        if order.delivery_status != Some(DeliveryStatus::PickupFailed) {
            return Err(OrderFlowError::InvalidTransition(format!("order {oid} is not awaiting a reschedule")));
        }
        let (service, booking_id) = match (&order.courier_service, &order.courier_booking_id) {
            (Some(s), Some(b)) if !b.is_empty() => (s.clone(), b.clone()),
            _ => {
                return Err(OrderFlowError::InvalidTransition(format!("order {oid} has no courier booking to rebook")))
            },
        };

        let verified = match self.gateway.verify(fee_payment_ref).await {
            Ok(v) => v,
            Err(e) => {
                debug!("📦️🔁️ Fee verification for order {oid} failed ({e}); retrying once");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                self.gateway.verify(fee_payment_ref).await.map_err(|e| OrderFlowError::FeeNotVerified(e.to_string()))?
            },
        };
        if !verified {
            return Err(OrderFlowError::FeeNotVerified(fee_payment_ref.to_string()));
        }

        let booking = self
            .courier
            .rebook_pickup(&service, &booking_id, new_time)
            .await
            .map_err(|e| OrderFlowError::compensation("rebook", e.to_string()))?;
        info!("📦️🔁️ Courier rebooked order {oid}: booking {} at {}", booking.booking_id, booking.pickup_time);

        let planned = plan_reschedule(&order, &booking.booking_id, booking.pickup_time)?;
        let plan = match planned {
            Planned::Noop => return Ok(order),
            Planned::Apply(plan) => plan,
        };
        let updated = self
            .store
            .update_order_guarded(oid, plan.expected_status, plan.expected_delivery_status, plan.update)
            .await?;
        dispatch_notifications(&self.notifier, &plan.notifications).await;
        self.call_pickup_rescheduled_hook(&updated, booking.pickup_time).await;
        Ok(updated)
    }

    /// Cancel the order after a missed pickup, with the full compensation contract plus the advisory seller
    /// reliability check.
    pub async fn cancel_after_missed_pickup(&self, oid: &OrderId, reason: &str) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(oid).await?;
        let seller_id = order.seller_id.clone();
        let updated = self.execute_cancellation(order, CancelInitiator::SellerAfterMissedPickup, reason).await?;
        self.check_seller_reliability(&updated, &seller_id).await;
        Ok(updated)
    }

    /// Scheduler entry point: cancel every order that has been sitting in `PickupFailed` for longer than `window`.
    ///
    /// Idempotent against a seller acting at the same moment: the guarded persist means only one of {manual action,
    /// auto-cancel} wins, and losing the race is recorded as a skip rather than an error.
    pub async fn auto_cancel_stale_pickup_failures(&self, window: Duration) -> Result<AutoCancelResult, OrderFlowError> {
        let cutoff = Utc::now() - window;
        let stale = self.store.list_stale_pickup_failures(cutoff).await?;
        debug!("🕰️🚫️ {} orders have a pickup failure older than {cutoff}", stale.len());
        let mut result = AutoCancelResult::default();
        for order in stale {
            let oid = order.order_id.clone();
            let reason = "Automatically cancelled: missed pickup was not rebooked in time";
            match self.execute_cancellation(order, CancelInitiator::Auto, reason).await {
                Ok(_) => result.cancelled.push(oid),
                Err(e) if e.is_conflict() => {
                    debug!("🕰️🚫️ Order {oid} was actioned concurrently; skipping auto-cancel");
                    result.skipped += 1;
                },
                Err(OrderFlowError::InvalidTransition(msg)) => {
                    debug!("🕰️🚫️ Order {oid} no longer qualifies for auto-cancel: {msg}");
                    result.skipped += 1;
                },
                Err(e) => {
                    error!("🕰️🚫️ Auto-cancel of order {oid} failed: {e}");
                    result.failed.push((oid, e.to_string()));
                },
            }
        }
        Ok(result)
    }

    //-------------------------------------- internals ---------------------------------------------------------------

    async fn fetch_order(&self, oid: &OrderId) -> Result<Order, OrderFlowError> {
        self.store
            .fetch_order_by_order_id(oid)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(oid.clone()))
    }

    /// The shared cancel-class execution path. Compensations run in the plan's fixed order: the courier booking is
    /// cancelled first (best-effort), then the refund is issued (mandatory). Only after both does the guarded persist
    /// run, and only after a successful persist do notifications and hooks fire.
    async fn execute_cancellation(
        &self,
        order: Order,
        initiator: CancelInitiator,
        reason: &str,
    ) -> Result<Order, OrderFlowError> {
        let oid = order.order_id.clone();
        let planned = plan_cancellation(&order, initiator, reason, Utc::now())?;
        let plan = match planned {
            Planned::Noop => {
                debug!("🚫️📦️ Order {oid} is already {}; nothing to do", order.status);
                return Ok(order);
            },
            Planned::Apply(plan) => plan,
        };

        for compensation in &plan.compensations {
            match compensation {
                crate::lifecycle::transition::Compensation::CancelCourierBooking { service, booking_id } => {
                    match self.courier.cancel_booking(service, booking_id).await {
                        Ok(true) => debug!("🚫️📦️ Courier booking {booking_id} for order {oid} cancelled"),
                        Ok(false) => {
                            warn!("🚫️📦️ Courier did not confirm cancellation of booking {booking_id} for order {oid}")
                        },
                        // a stale courier booking is a correctable side effect; a failed refund is not
                        Err(e) => warn!("🚫️📦️ Courier cancel for order {oid} failed: {e}. Continuing with the refund"),
                    }
                },
                crate::lifecycle::transition::Compensation::IssueRefund => {
                    self.issue_refund(&order, reason).await?;
                },
            }
        }

        let updated = match self
            .store
            .update_order_guarded(&oid, plan.expected_status, plan.expected_delivery_status, plan.update)
            .await
        {
            Ok(o) => o,
            Err(OrderStoreError::StatusConflict { .. }) => {
                // another writer got there first. If it reached the same terminal state, converge; the refund ledger
                // ensures the gateway was still only called once.
                let current = self.fetch_order(&oid).await?;
                if current.status == initiator.terminal_status() {
                    info!("🚫️📦️ Order {oid} was concurrently finalised as {}; converging", current.status);
                    return Ok(current);
                }
                return Err(OrderFlowError::Conflict(format!(
                    "order {oid} moved to {} while the cancellation was in flight",
                    current.status
                )));
            },
            Err(e) => return Err(e.into()),
        };
        info!("🚫️📦️ Order {oid} finalised as {} ({reason})", updated.status);

        dispatch_notifications(&self.notifier, &plan.notifications).await;
        self.call_order_annulled_hook(&updated).await;
        Ok(updated)
    }

    /// Issue the refund through the ledger.
    ///
    /// An existing successful refund short-circuits the gateway call, which is what makes a double cancel produce
    /// exactly one refund. A `Pending` row is written before the gateway call so a crash mid-refund leaves an
    /// auditable trace, and the row is promoted to `Success`/`Failed` afterwards.
    async fn issue_refund(&self, order: &Order, reason: &str) -> Result<(), OrderFlowError> {
        let oid = &order.order_id;
        if let Some(existing) = self.store.fetch_successful_refund(oid).await? {
            info!("💸️ Order {oid} already has successful refund {}; skipping the gateway call", existing.id);
            return Ok(());
        }
        let refund = self.store.insert_refund(NewRefund::new(order, reason)).await?;
        match self.gateway.refund(&order.payment_reference, order.total_amount, reason).await {
            Ok(receipt) => {
                self.store
                    .update_refund_status(refund.id, RefundStatus::Success, Some(receipt.gateway_reference.clone()))
                    .await?;
                info!("💸️ Refund of {} for order {oid} confirmed (gateway ref {})", order.total_amount, receipt.gateway_reference);
                Ok(())
            },
            Err(e) => {
                if let Err(e2) = self.store.update_refund_status(refund.id, RefundStatus::Failed, None).await {
                    warn!("💸️ Could not record refund failure for order {oid}: {e2}");
                }
                error!("💸️ Refund for order {oid} failed: {e}. Aborting the cancellation");
                Err(OrderFlowError::compensation("refund", e.to_string()))
            },
        }
    }

    /// Advisory only: sellers who keep missing pickups get a warning notification, never a block.
    async fn check_seller_reliability(&self, order: &Order, seller_id: &str) {
        let since = Utc::now() - Duration::days(RELIABILITY_WINDOW_DAYS);
        match self.store.count_missed_pickups_since(seller_id, since).await {
            Ok(count) if count >= RELIABILITY_WARNING_THRESHOLD => {
                info!("⚠️ Seller {seller_id} has missed {count} pickups in the last {RELIABILITY_WINDOW_DAYS} days");
                let intent = NotificationIntent::new(
                    Recipient::seller(order),
                    NotificationKind::SellerReliabilityWarning,
                    "Pickup reliability warning",
                    format!(
                        "You have missed {count} courier pickups in the last {RELIABILITY_WINDOW_DAYS} days. Repeated \
                         missed pickups disappoint buyers; please make sure your books are ready for collection."
                    ),
                );
                dispatch_notifications(&self.notifier, &[intent]).await;
            },
            Ok(_) => {},
            Err(e) => warn!("⚠️ Could not run the seller reliability check for {seller_id}: {e}"),
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        for producer in &self.producers.order_annulled_producer {
            let event = OrderAnnulledEvent::new(order.clone());
            producer.publish_event(event).await;
        }
    }

    async fn call_pickup_missed_hook(&self, order: &Order, feedback: &str) {
        for producer in &self.producers.pickup_missed_producer {
            let event = PickupMissedEvent::new(order.clone(), feedback.to_string());
            producer.publish_event(event).await;
        }
    }

    async fn call_pickup_rescheduled_hook(&self, order: &Order, new_time: DateTime<Utc>) {
        for producer in &self.producers.pickup_rescheduled_producer {
            let event = PickupRescheduledEvent::new(order.clone(), new_time);
            producer.publish_event(event).await;
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
