use btx_common::Secret;
use log::*;

#[derive(Debug, Clone, Default)]
pub struct PaystackConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
}

impl PaystackConfig {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), secret_key: Secret::new(secret_key.into()) }
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("BTX_PAYSTACK_API_URL").unwrap_or_else(|_| "https://api.paystack.co".to_string());
        let secret_key = Secret::new(std::env::var("BTX_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            warn!("BTX_PAYSTACK_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        debug!("💸️ Paystack gateway configured for {base_url} with key {}", secret_key.hint());
        Self { base_url, secret_key }
    }
}
