use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::RescheduleQuote,
    traits::data_objects::{NewBooking, TrackingUpdate},
};

/// The courier API, reduced to the calls the lifecycle engine needs.
///
/// `fetch_status` and `reschedule_quote` are reads; callers may retry them once. `cancel_booking` and
/// `rebook_pickup` are mutations and are never retried automatically.
#[allow(async_fn_in_trait)]
pub trait CourierApi: Clone {
    /// Cancel the pickup booking. Returns `true` if the courier confirmed the cancellation.
    async fn cancel_booking(&self, service: &str, booking_id: &str) -> Result<bool, CourierApiError>;

    /// Fetch the current tracking status and event list for a shipment.
    async fn fetch_status(&self, tracking_number: &str) -> Result<TrackingUpdate, CourierApiError>;

    /// Book a new pickup attempt against an existing (failed) booking.
    async fn rebook_pickup(
        &self,
        service: &str,
        booking_id: &str,
        new_time: DateTime<Utc>,
    ) -> Result<NewBooking, CourierApiError>;

    /// Quote the fee and candidate pickup slots for rebooking a missed pickup.
    async fn reschedule_quote(&self, service: &str) -> Result<RescheduleQuote, CourierApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum CourierApiError {
    #[error("Could not reach the courier API: {0}")]
    Unreachable(String),
    #[error("The courier rejected the request: {0}")]
    Rejected(String),
    #[error("The courier does not know tracking number {0}")]
    UnknownTrackingNumber(String),
}
