//! BookTrade Order Lifecycle Engine
//!
//! This library contains the core order lifecycle logic for the BookTrade textbook marketplace: the rules that move a
//! purchase from "paid" through seller commitment, courier pickup, transit and delivery, or through
//! cancellation/decline/refund, while keeping order status, delivery status, refund records and user notifications
//! consistent despite partial failures.
//!
//! The library is divided into three main sections:
//! 1. The collaborator traits ([`mod@traits`]). The persistent store, payment gateway, courier API, notifier and
//!    payout provisioner are all expressed as traits, so the lifecycle logic can be exercised against fakes in tests
//!    and against the real REST clients in production. An SQLite store implementation is provided behind the `sqlite`
//!    feature.
//! 2. The lifecycle API ([`mod@lifecycle`]). [`OrderFlowApi`] carries the buyer/seller cancellation paths, the
//!    missed-pickup sub-flow and the reschedule flow. Transitions are planned as pure data first (see
//!    [`lifecycle::transition`]) and only then executed: compensations in a fixed order, a guarded persist, and a
//!    best-effort notification dispatch that never rolls back committed state.
//! 3. The tracking reconciliation job ([`mod@reconciliation`]). A poll-driven batch that maps courier vocabulary onto
//!    the internal delivery status axis, persists diffs idempotently and fans out notifications at-least-once.
//!
//! The engine also emits lifecycle events (order cancelled, pickup missed, order delivered, ...) through a simple
//! actor-style hook system, so hosts can attach custom behaviour without touching the transition logic.
pub mod db_types;
pub mod events;
pub mod lifecycle;
pub mod reconciliation;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteOrderStore;

pub use lifecycle::{
    errors::OrderFlowError,
    order_flow_api::OrderFlowApi,
    status_map::map_courier_status,
    transition::{CancelInitiator, Planned, TransitionPlan},
};
pub use reconciliation::{ReconcileOutcome, ReconciliationResult, TrackingReconciler};
pub use traits::{
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
};
