use thiserror::Error;

use crate::lifecycle::notifications::NotificationKind;

/// The notification capability: in-app records and transactional email.
///
/// Both calls are best-effort from the engine's perspective. The dispatcher logs failures and never lets them abort
/// or roll back a committed state change.
#[allow(async_fn_in_trait)]
pub trait Notifier: Clone {
    /// Record an in-app notification for a user.
    async fn notify(&self, user_id: &str, title: &str, message: &str, kind: NotificationKind)
        -> Result<(), NotifierError>;

    /// Send a transactional email.
    async fn email(&self, address: &str, subject: &str, html_body: &str, text_body: &str)
        -> Result<(), NotifierError>;
}

#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Could not deliver notification: {0}")]
    DeliveryFailed(String),
}
