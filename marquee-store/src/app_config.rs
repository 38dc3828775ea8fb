use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    pub tmdb: TmdbConfig,
    pub smtp: SmtpConfig,
    pub business_rules: BusinessRules,
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Origin of the web client; checkout redirects land here.
    pub public_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// `whsec_`-prefixed signing secret of the identity provider's webhooks.
    pub identity_webhook_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeConfig {
    pub api_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_webhook_tolerance() -> i64 { 300 }
fn default_currency() -> String { "usd".into() }

#[derive(Debug, Deserialize, Clone)]
pub struct TmdbConfig {
    pub access_token: String,
    #[serde(default = "default_tmdb_url")]
    pub base_url: String,
}

fn default_tmdb_url() -> String { "https://api.themoviedb.org/3".into() }

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub hold_timeout_seconds: i64,
    pub max_seats_per_booking: usize,
    pub sweep_retry_seconds: i64,
    pub reminder_lead_hours: i64,
    pub reminder_window_minutes: i64,
    /// IANA zone used when rendering show times in emails.
    pub display_timezone: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    /// Claimed jobs reappear if not acknowledged within this window.
    pub lease_seconds: i64,
    pub batch_size: usize,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `MARQUEE__STRIPE__API_KEY=sk_test_...`
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn test_checked_in_defaults_deserialize() {
        let cfg: Config = config::Config::builder()
            .add_source(File::from_str(include_str!("../../config/default.toml"), FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.business_rules.hold_timeout_seconds, 600);
        assert_eq!(cfg.business_rules.max_seats_per_booking, 5);
        assert_eq!(cfg.stripe.currency, "usd");
        assert_eq!(cfg.worker.lease_seconds, 60);
    }
}
