//! The BookTrade order lifecycle server.
//!
//! Wires the lifecycle engine to the outside world: the SQLite store, the courier and Paystack REST clients, the
//! platform API (in-app notifications, transactional mail, seller banking details), the HTTP surface buyers and
//! sellers act through, and the background workers that keep tracking state reconciled and sweep stale missed
//! pickups.
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod routes;
pub mod server;
pub mod workers;

use book_trade_engine::{OrderFlowApi, SqliteOrderStore, TrackingReconciler};

use crate::integrations::{CourierIntegration, PaystackGateway, PaystackPayout, PlatformNotifier};

/// The fully wired lifecycle API the route handlers and the auto-cancel worker run against.
pub type BackendFlowApi = OrderFlowApi<SqliteOrderStore, PaystackGateway, CourierIntegration, PlatformNotifier>;
/// The fully wired reconciliation job the tracking worker runs.
pub type BackendReconciler = TrackingReconciler<SqliteOrderStore, CourierIntegration, PlatformNotifier, PaystackPayout>;
