use btx_common::Secret;
use log::*;

#[derive(Debug, Clone, Default)]
pub struct CourierConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
}

impl CourierConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_key: Secret::new(api_key.into()) }
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("BTX_COURIER_API_URL").unwrap_or_else(|_| {
            warn!("BTX_COURIER_API_URL not set, using (probably useless) default");
            "https://api.courier.example.com/v2".to_string()
        });
        let api_key = Secret::new(std::env::var("BTX_COURIER_API_KEY").unwrap_or_else(|_| {
            warn!("BTX_COURIER_API_KEY not set, using (probably useless) default");
            "ck_00000000000000".to_string()
        }));
        debug!("🛰️ Courier API configured for {base_url} with key {}", api_key.hint());
        Self { base_url, api_key }
    }
}
