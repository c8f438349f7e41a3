use book_trade_engine::{
    db_types::{RescheduleQuote, TrackingEvent},
    traits::data_objects::{NewBooking, TrackingUpdate},
    CourierApi,
    CourierApiError,
};
use chrono::{DateTime, Utc};
use courier_tools::{CourierClient, CourierClientError, ParcelEvent};
use log::*;

/// Implements the engine's [`CourierApi`] over the aggregator REST client.
#[derive(Clone)]
pub struct CourierIntegration {
    client: CourierClient,
}

impl CourierIntegration {
    pub fn new(client: CourierClient) -> Self {
        Self { client }
    }
}

fn to_tracking_event(event: ParcelEvent) -> TrackingEvent {
    TrackingEvent {
        status: event.status,
        description: event.description,
        timestamp: event.timestamp,
        location: event.location,
    }
}

fn map_error(tracking_number: Option<&str>, e: CourierClientError) -> CourierApiError {
    match e {
        CourierClientError::QueryError { status: 404, .. } => match tracking_number {
            Some(t) => CourierApiError::UnknownTrackingNumber(t.to_string()),
            None => CourierApiError::Rejected("not found".to_string()),
        },
        CourierClientError::QueryError { status, message } => {
            CourierApiError::Rejected(format!("error {status}: {message}"))
        },
        other => CourierApiError::Unreachable(other.to_string()),
    }
}

impl CourierApi for CourierIntegration {
    async fn cancel_booking(&self, service: &str, booking_id: &str) -> Result<bool, CourierApiError> {
        let response = self.client.cancel_collection(service, booking_id).await.map_err(|e| map_error(None, e))?;
        if !response.success {
            debug!("Courier refused to cancel booking {booking_id}: {:?}", response.message);
        }
        Ok(response.success)
    }

    async fn fetch_status(&self, tracking_number: &str) -> Result<TrackingUpdate, CourierApiError> {
        let response =
            self.client.track_shipment(tracking_number).await.map_err(|e| map_error(Some(tracking_number), e))?;
        Ok(TrackingUpdate {
            status: response.status,
            description: response.status_description,
            events: response.events.into_iter().map(to_tracking_event).collect(),
        })
    }

    async fn rebook_pickup(
        &self,
        service: &str,
        booking_id: &str,
        new_time: DateTime<Utc>,
    ) -> Result<NewBooking, CourierApiError> {
        let response =
            self.client.rebook_collection(service, booking_id, new_time).await.map_err(|e| map_error(None, e))?;
        Ok(NewBooking { booking_id: response.booking_id, pickup_time: response.pickup_time })
    }

    async fn reschedule_quote(&self, service: &str) -> Result<RescheduleQuote, CourierApiError> {
        let response = self.client.reschedule_quote(service).await.map_err(|e| map_error(None, e))?;
        Ok(RescheduleQuote {
            quote_id: response.quote_id,
            courier_service: response.service_level,
            reschedule_fee: response.fee_cents,
            available_times: response.available_times,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parcel_events_map_onto_tracking_events() {
        let event = ParcelEvent {
            status: "IN_TRANSIT".into(),
            description: "Arrived at hub".into(),
            timestamp: Utc::now(),
            location: Some("JHB".into()),
        };
        let mapped = to_tracking_event(event);
        assert_eq!(mapped.status, "IN_TRANSIT");
        assert_eq!(mapped.location.as_deref(), Some("JHB"));
    }

    #[test]
    fn missing_shipments_map_onto_unknown_tracking_number() {
        let e = CourierClientError::QueryError { status: 404, message: "no such shipment".into() };
        let mapped = map_error(Some("TRK-1"), e);
        assert!(matches!(mapped, CourierApiError::UnknownTrackingNumber(t) if t == "TRK-1"));

        let e = CourierClientError::RestResponseError("timed out".into());
        assert!(matches!(map_error(Some("TRK-1"), e), CourierApiError::Unreachable(_)));
    }
}
