//! The collaborator contracts the lifecycle engine is written against.
//!
//! Production hosts plug in the SQLite store and the REST clients; tests plug in the fakes from
//! [`crate::test_utils`]. None of the lifecycle logic ever talks to a concrete backend directly.
mod courier;
mod notifier;
mod order_store;
mod payment_gateway;
mod payout;

pub mod data_objects;

pub use courier::{CourierApi, CourierApiError};
pub use notifier::{Notifier, NotifierError};
pub use order_store::{OrderStore, OrderStoreError};
pub use payment_gateway::{PaymentGateway, PaymentGatewayError};
pub use payout::{PayoutProvisioner, PayoutProvisionerError};
