use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::TrackingEvent;

/// The gateway's confirmation of an issued refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub gateway_reference: String,
}

/// A point-in-time tracking report from the courier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingUpdate {
    /// The courier's own status vocabulary, e.g. `IN_TRANSIT`. Mapped onto the internal delivery status axis by
    /// [`crate::lifecycle::status_map::map_courier_status`].
    pub status: String,
    pub description: String,
    #[serde(default)]
    pub events: Vec<TrackingEvent>,
}

/// A replacement booking returned by the courier after a successful rebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub booking_id: String,
    pub pickup_time: DateTime<Utc>,
}
