//! A typed client for the slice of the Paystack API that BookTrade uses: refunding a charge, verifying that a
//! transaction settled, and provisioning transfer recipients for seller payouts.
//!
//! All amounts are in ZAR cents, matching Paystack's integer subunit convention.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::PaystackApi;
pub use config::PaystackConfig;
pub use data_objects::{ApiResponse, RecipientData, RefundData, TransactionData};
pub use error::PaystackApiError;
