//! The fixed courier-vocabulary to delivery-status lookup table.
use crate::db_types::DeliveryStatus;

/// Map a courier status string onto the internal delivery status axis.
///
/// Returns `None` for vocabulary the table does not know, which reconciliation treats as "no change" rather than an
/// error; one unrecognised courier string must never abort a batch.
pub fn map_courier_status(courier_status: &str) -> Option<DeliveryStatus> {
    match courier_status {
        "COLLECTED" => Some(DeliveryStatus::Collected),
        "PICKED_UP" => Some(DeliveryStatus::PickedUp),
        "IN_TRANSIT" => Some(DeliveryStatus::InTransit),
        "OUT_FOR_DELIVERY" => Some(DeliveryStatus::OutForDelivery),
        "DELIVERED" | "DELIVERED_TO_RECIPIENT" => Some(DeliveryStatus::Delivered),
        "COLLECTION_FAILED" => Some(DeliveryStatus::PickupFailed),
        "DELIVERY_FAILED" => Some(DeliveryStatus::DeliveryFailed),
        "RETURNED_TO_SENDER" => Some(DeliveryStatus::Returned),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_known_status_maps_to_exactly_one_delivery_status() {
        let table = [
            ("COLLECTED", DeliveryStatus::Collected),
            ("PICKED_UP", DeliveryStatus::PickedUp),
            ("IN_TRANSIT", DeliveryStatus::InTransit),
            ("OUT_FOR_DELIVERY", DeliveryStatus::OutForDelivery),
            ("DELIVERED", DeliveryStatus::Delivered),
            ("DELIVERED_TO_RECIPIENT", DeliveryStatus::Delivered),
            ("COLLECTION_FAILED", DeliveryStatus::PickupFailed),
            ("DELIVERY_FAILED", DeliveryStatus::DeliveryFailed),
            ("RETURNED_TO_SENDER", DeliveryStatus::Returned),
        ];
        for (courier, expected) in table {
            assert_eq!(map_courier_status(courier), Some(expected), "mapping for {courier}");
        }
    }

    #[test]
    fn unknown_statuses_map_to_none() {
        assert_eq!(map_courier_status("TELEPORTED"), None);
        assert_eq!(map_courier_status(""), None);
        // the table is case-sensitive; couriers send upper snake case
        assert_eq!(map_courier_status("delivered"), None);
    }
}
