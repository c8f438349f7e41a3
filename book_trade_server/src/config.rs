use std::env;

use btx_common::Secret;
use chrono::Duration;
use courier_tools::CourierConfig;
use log::*;
use paystack_tools::PaystackConfig;

const DEFAULT_BTX_HOST: &str = "127.0.0.1";
const DEFAULT_BTX_PORT: u16 = 8480;
const DEFAULT_TRACKING_INTERVAL_SECS: u64 = 900;
const DEFAULT_AUTO_CANCEL_WINDOW: Duration = Duration::hours(48);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// How often the tracking reconciliation worker polls the courier.
    pub tracking_interval: std::time::Duration,
    /// How long an order may sit in the missed-pickup state before the sweeper cancels it.
    pub auto_cancel_window: Duration,
    /// When running multiple instances behind a load balancer, only one should run the background workers.
    pub run_background_workers: bool,
    pub courier: CourierConfig,
    pub paystack: PaystackConfig,
    pub platform: PlatformConfig,
}

/// The marketplace platform API: in-app notification records, transactional mail, and seller banking details.
#[derive(Clone, Debug, Default)]
pub struct PlatformConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BTX_HOST.to_string(),
            port: DEFAULT_BTX_PORT,
            database_url: String::default(),
            tracking_interval: std::time::Duration::from_secs(DEFAULT_TRACKING_INTERVAL_SECS),
            auto_cancel_window: DEFAULT_AUTO_CANCEL_WINDOW,
            run_background_workers: true,
            courier: CourierConfig::default(),
            paystack: PaystackConfig::default(),
            platform: PlatformConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BTX_HOST").ok().unwrap_or_else(|| DEFAULT_BTX_HOST.into());
        let port = parse_port(env::var("BTX_PORT").ok());
        let database_url = env::var("BTX_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ BTX_DATABASE_URL is not set. Using a temporary in-memory database");
            "sqlite://:memory:".to_string()
        });
        let tracking_interval =
            std::time::Duration::from_secs(parse_seconds(env::var("BTX_TRACKING_INTERVAL_SECS").ok()));
        let auto_cancel_window = parse_window_hours(env::var("BTX_AUTO_CANCEL_WINDOW_HOURS").ok());
        let run_background_workers = btx_common::helpers::parse_boolean_flag(env::var("BTX_RUN_WORKERS").ok(), true);
        let platform = PlatformConfig {
            api_url: env::var("BTX_PLATFORM_API_URL").unwrap_or_else(|_| {
                warn!("🪛️ BTX_PLATFORM_API_URL is not set. Using (probably useless) default");
                "http://localhost:9000".to_string()
            }),
            api_key: Secret::new(env::var("BTX_PLATFORM_API_KEY").unwrap_or_default()),
        };
        Self {
            host,
            port,
            database_url,
            tracking_interval,
            auto_cancel_window,
            run_background_workers,
            courier: CourierConfig::new_from_env_or_default(),
            paystack: PaystackConfig::new_from_env_or_default(),
            platform,
        }
    }
}

fn parse_port(value: Option<String>) -> u16 {
    match value {
        Some(s) => s.parse::<u16>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid port for BTX_PORT. {e} Using the default, {DEFAULT_BTX_PORT}, instead.");
            DEFAULT_BTX_PORT
        }),
        None => DEFAULT_BTX_PORT,
    }
}

fn parse_seconds(value: Option<String>) -> u64 {
    match value {
        Some(s) => s.parse::<u64>().unwrap_or_else(|e| {
            error!(
                "🪛️ {s} is not a valid interval for BTX_TRACKING_INTERVAL_SECS. {e} Using the default, \
                 {DEFAULT_TRACKING_INTERVAL_SECS}s, instead."
            );
            DEFAULT_TRACKING_INTERVAL_SECS
        }),
        None => DEFAULT_TRACKING_INTERVAL_SECS,
    }
}

fn parse_window_hours(value: Option<String>) -> Duration {
    match value {
        Some(s) => s.parse::<i64>().map(Duration::hours).unwrap_or_else(|e| {
            error!(
                "🪛️ {s} is not a valid window for BTX_AUTO_CANCEL_WINDOW_HOURS. {e} Using the default, \
                 {DEFAULT_AUTO_CANCEL_WINDOW}, instead."
            );
            DEFAULT_AUTO_CANCEL_WINDOW
        }),
        None => DEFAULT_AUTO_CANCEL_WINDOW,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn port_parsing_falls_back_to_the_default() {
        assert_eq!(parse_port(None), DEFAULT_BTX_PORT);
        assert_eq!(parse_port(Some("9999".into())), 9999);
        assert_eq!(parse_port(Some("not-a-port".into())), DEFAULT_BTX_PORT);
    }

    #[test]
    fn interval_parsing_falls_back_to_the_default() {
        assert_eq!(parse_seconds(Some("60".into())), 60);
        assert_eq!(parse_seconds(Some("soon".into())), DEFAULT_TRACKING_INTERVAL_SECS);
        assert_eq!(parse_window_hours(Some("72".into())), Duration::hours(72));
        assert_eq!(parse_window_hours(Some("-".into())), DEFAULT_AUTO_CANCEL_WINDOW);
    }
}
