//! A thin, typed client for the courier aggregator REST API.
//!
//! BookTrade books, cancels and tracks parcels through a single aggregator that fronts the local courier services
//! (The Courier Guy et al.), selecting the carrier with a `service_level` parameter. This crate only speaks the wire
//! protocol; retry policy and state transitions belong to the lifecycle engine.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::CourierClient;
pub use config::CourierConfig;
pub use data_objects::{BookingResponse, CancelResponse, ParcelEvent, QuoteResponse, TrackingResponse};
pub use error::CourierClientError;
