//! The periodic tracking reconciliation job.
//!
//! Polls the courier for every order with an open delivery, maps the courier's vocabulary onto the internal delivery
//! status axis, persists the diff, and fans out notifications exactly once per status change. The batch is isolated
//! per order: one bad order (courier API down, store conflict, even a panic) is recorded in that order's outcome and
//! never blocks the rest. Overall job success means "the batch completed", not "every order succeeded".
use std::fmt::Display;

use chrono::Utc;
use futures_util::FutureExt;
use log::*;

use crate::{
    db_types::{DeliveryStatus, Order, OrderId},
    events::{EventProducers, OrderDeliveredEvent},
    lifecycle::{
        notifications::dispatch_notifications,
        status_map::map_courier_status,
        transition::{plan_delivery_update, Planned},
    },
    traits::{CourierApi, Notifier, OrderStore, PayoutProvisioner},
};

/// The per-order result record of a reconciliation pass.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The delivery status changed and was persisted. If payout provisioning was triggered and failed, the failure
    /// rides along here; it does not undo the tracking update.
    Updated { order_id: OrderId, new_status: DeliveryStatus, payout_error: Option<String> },
    /// The courier reported the status we already hold, or vocabulary the mapping table does not know.
    NoChange(OrderId),
    /// The courier could not be reached or rejected the status fetch (after one retry).
    ApiError { order_id: OrderId, message: String },
    /// The status change could not be persisted.
    UpdateError { order_id: OrderId, message: String },
    /// Something unexpected happened while processing this order.
    ProcessingError { order_id: OrderId, message: String },
}

impl ReconcileOutcome {
    pub fn order_id(&self) -> &OrderId {
        match self {
            ReconcileOutcome::Updated { order_id, .. }
            | ReconcileOutcome::NoChange(order_id)
            | ReconcileOutcome::ApiError { order_id, .. }
            | ReconcileOutcome::UpdateError { order_id, .. }
            | ReconcileOutcome::ProcessingError { order_id, .. } => order_id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::ApiError { .. }
                | ReconcileOutcome::UpdateError { .. }
                | ReconcileOutcome::ProcessingError { .. }
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationResult {
    pub outcomes: Vec<ReconcileOutcome>,
}

impl ReconciliationResult {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn updated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, ReconcileOutcome::Updated { .. })).count()
    }

    pub fn no_change_count(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, ReconcileOutcome::NoChange(_))).count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_error()).count()
    }
}

impl Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} orders polled: {} updated, {} unchanged, {} errors",
            self.total(),
            self.updated_count(),
            self.no_change_count(),
            self.error_count()
        )
    }
}

/// The reconciliation job itself. Construct once with the collaborators and call [`run_once`](Self::run_once) from a
/// scheduler.
pub struct TrackingReconciler<S, C, N, P> {
    store: S,
    courier: C,
    notifier: N,
    payout: P,
    producers: EventProducers,
    /// Inter-call delay throttling the outbound rate to the courier API.
    throttle: std::time::Duration,
}

impl<S, C, N, P> TrackingReconciler<S, C, N, P> {
    pub fn new(store: S, courier: C, notifier: N, payout: P, producers: EventProducers) -> Self {
        Self { store, courier, notifier, payout, producers, throttle: std::time::Duration::from_millis(250) }
    }

    pub fn with_throttle(mut self, throttle: std::time::Duration) -> Self {
        self.throttle = throttle;
        self
    }
}

impl<S, C, N, P> TrackingReconciler<S, C, N, P>
where
    S: OrderStore,
    C: CourierApi,
    N: Notifier,
    P: PayoutProvisioner,
{
    /// Run a single reconciliation pass over every open delivery.
    pub async fn run_once(&self) -> Result<ReconciliationResult, crate::traits::OrderStoreError> {
        let open = self.store.list_open_deliveries().await?;
        debug!("🛰️ Reconciling {} open deliveries", open.len());
        let mut result = ReconciliationResult::default();
        let count = open.len();
        for order in open {
            let oid = order.order_id.clone();
            let outcome = match std::panic::AssertUnwindSafe(self.reconcile_order(order)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("🛰️ Panic while reconciling order {oid}");
                    ReconcileOutcome::ProcessingError { order_id: oid, message: "panic during processing".to_string() }
                },
            };
            if let ReconcileOutcome::Updated { order_id, new_status, .. } = &outcome {
                info!("🛰️ Order {order_id} delivery status advanced to {new_status}");
            }
            result.outcomes.push(outcome);
            if count > 1 {
                tokio::time::sleep(self.throttle).await;
            }
        }
        info!("🛰️ Reconciliation pass complete. {result}");
        Ok(result)
    }

    async fn reconcile_order(&self, order: Order) -> ReconcileOutcome {
        let oid = order.order_id.clone();
        let tracking_number = match order.tracking_number.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                return ReconcileOutcome::ProcessingError {
                    order_id: oid,
                    message: "open delivery without a tracking number".to_string(),
                }
            },
        };

        // status fetches are read-only; retry once with a short backoff before giving up on this order
        let tracking = match self.courier.fetch_status(&tracking_number).await {
            Ok(t) => t,
            Err(first) => {
                debug!("🛰️ Status fetch for order {oid} failed ({first}); retrying once");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                match self.courier.fetch_status(&tracking_number).await {
                    Ok(t) => t,
                    Err(e) => return ReconcileOutcome::ApiError { order_id: oid, message: e.to_string() },
                }
            },
        };

        let mapped = match map_courier_status(&tracking.status) {
            Some(m) => m,
            None => {
                // unknown courier vocabulary falls back to "no change" rather than erroring the batch
                debug!("🛰️ Order {oid}: unrecognised courier status '{}'; leaving unchanged", tracking.status);
                return ReconcileOutcome::NoChange(oid);
            },
        };

        let plan = match plan_delivery_update(&order, mapped, &tracking, Utc::now()) {
            Planned::Noop => return ReconcileOutcome::NoChange(oid),
            Planned::Apply(plan) => plan,
        };

        let updated = match self
            .store
            .update_order_guarded(&oid, plan.expected_status, plan.expected_delivery_status, plan.update)
            .await
        {
            Ok(o) => o,
            Err(e) => return ReconcileOutcome::UpdateError { order_id: oid, message: e.to_string() },
        };

        dispatch_notifications(&self.notifier, &plan.notifications).await;

        let mut payout_error = None;
        if mapped == DeliveryStatus::Delivered {
            match self.payout.create_recipient(&updated.seller_id).await {
                Ok(recipient_code) => {
                    info!("💰️ Payout recipient {recipient_code} provisioned for seller {}", updated.seller_id)
                },
                Err(e) => {
                    // recorded alongside the tracking update; the update itself stands
                    warn!("💰️ Payout provisioning for seller {} failed: {e}", updated.seller_id);
                    payout_error = Some(e.to_string());
                },
            }
            for producer in &self.producers.order_delivered_producer {
                producer.publish_event(OrderDeliveredEvent::new(updated.clone())).await;
            }
        }

        ReconcileOutcome::Updated { order_id: updated.order_id, new_status: mapped, payout_error }
    }
}
