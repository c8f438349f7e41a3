use book_trade_engine::{lifecycle::notifications::NotificationKind, Notifier, NotifierError};

use crate::integrations::PlatformClient;

/// Implements the engine's [`Notifier`] over the platform API: notification rows for the in-app feed, mail through
/// the platform's transactional mail endpoint.
#[derive(Clone)]
pub struct PlatformNotifier {
    platform: PlatformClient,
}

impl PlatformNotifier {
    pub fn new(platform: PlatformClient) -> Self {
        Self { platform }
    }
}

fn kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::OrderCancelled => "order_cancelled",
        NotificationKind::OrderDeclined => "order_declined",
        NotificationKind::PickupMissed => "pickup_missed",
        NotificationKind::PickupRescheduled => "pickup_rescheduled",
        NotificationKind::DeliveryUpdate => "delivery_update",
        NotificationKind::OrderDelivered => "order_delivered",
        NotificationKind::SellerReliabilityWarning => "seller_reliability_warning",
    }
}

impl Notifier for PlatformNotifier {
    async fn notify(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifierError> {
        self.platform
            .record_notification(user_id, title, message, kind_label(kind))
            .await
            .map_err(|e| NotifierError::DeliveryFailed(e.to_string()))
    }

    async fn email(
        &self,
        address: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), NotifierError> {
        self.platform
            .send_email(address, subject, html_body, text_body)
            .await
            .map_err(|e| NotifierError::DeliveryFailed(e.to_string()))
    }
}
