//! Notification intents and their post-commit dispatcher.
//!
//! Transition planning produces a list of [`NotificationIntent`]s rather than sending anything itself. Once the state
//! change has been persisted, [`dispatch_notifications`] runs the list against the host's [`Notifier`]: an in-app
//! record for the user, plus a transactional email when an address is on file. Failures are logged and swallowed;
//! committed state is never rolled back because an email bounced.
use log::*;
use serde::{Deserialize, Serialize};

use crate::{db_types::Order, traits::Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    OrderCancelled,
    OrderDeclined,
    PickupMissed,
    PickupRescheduled,
    DeliveryUpdate,
    OrderDelivered,
    SellerReliabilityWarning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    pub email: Option<String>,
}

impl Recipient {
    pub fn buyer(order: &Order) -> Self {
        Self { user_id: order.buyer_id.clone(), email: order.buyer_email.clone() }
    }

    pub fn seller(order: &Order) -> Self {
        Self { user_id: order.seller_id.clone(), email: order.seller_email.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl NotificationIntent {
    pub fn new(recipient: Recipient, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { recipient, kind, title: title.into(), message: message.into() }
    }
}

/// Execute the intents against the notifier. Both the in-app record and the email are attempted independently, even
/// if one of them fails.
pub async fn dispatch_notifications<N: Notifier>(notifier: &N, intents: &[NotificationIntent]) {
    for intent in intents {
        if let Err(e) = notifier
            .notify(&intent.recipient.user_id, &intent.title, &intent.message, intent.kind)
            .await
        {
            warn!("📣️ In-app notification to user {} failed: {e}", intent.recipient.user_id);
        }
        if let Some(address) = &intent.recipient.email {
            let html = format!("<p>{}</p>", intent.message);
            if let Err(e) = notifier.email(address, &intent.title, &html, &intent.message).await {
                warn!("📣️ Email to {address} failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::RecordingNotifier;

    #[tokio::test]
    async fn dispatch_is_best_effort() {
        let _ = env_logger::try_init();
        let notifier = RecordingNotifier::failing();
        let intent = NotificationIntent::new(
            Recipient { user_id: "buyer-1".into(), email: Some("buyer@example.com".into()) },
            NotificationKind::OrderCancelled,
            "Order cancelled",
            "Your order has been cancelled and refunded.",
        );
        // must not panic or return an error surface; failures are logged only
        dispatch_notifications(&notifier, &[intent]).await;
        assert_eq!(notifier.notify_calls().len(), 1);
        assert_eq!(notifier.email_calls().len(), 1);
    }
}
