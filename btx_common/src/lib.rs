mod cents;
mod secret;

pub mod helpers;

pub use cents::{Cents, CentsConversionError, ZAR_CURRENCY_CODE};
pub use secret::Secret;
