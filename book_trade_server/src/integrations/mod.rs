//! Adapters that implement the engine's collaborator traits over the real REST clients.
mod courier;
mod notifier;
mod payment;
mod payout;
mod platform;

pub use courier::CourierIntegration;
pub use notifier::PlatformNotifier;
pub use payment::PaystackGateway;
pub use payout::PaystackPayout;
pub use platform::{BankingDetails, PlatformApiError, PlatformClient};
