use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub resiliency: ResiliencyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    /// Search, revalidation, booking and checkout creation.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Cancel, refund, reissue and single ticket lookups.
    #[serde(default = "default_mutation_timeout")]
    pub mutation_timeout_secs: u64,
}

fn default_request_timeout() -> u64 { 60 }
fn default_mutation_timeout() -> u64 { 30 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    #[serde(default)]
    pub store: SessionBackend,
    /// How often the in-memory store drops expired flows.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_ttl() -> u64 { 900 }
fn default_sweep_interval() -> u64 { 60 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            store: SessionBackend::default(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Attempt schedule for one polling loop, in milliseconds.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PollScheduleConfig {
    pub max_attempts: u32,
    pub fast_attempts: u32,
    pub fast_interval_ms: u64,
    pub slow_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_verification")]
    pub verification: PollScheduleConfig,
    #[serde(default = "default_ticket")]
    pub ticket: PollScheduleConfig,
}

fn default_verification() -> PollScheduleConfig {
    PollScheduleConfig { max_attempts: 10, fast_attempts: 5, fast_interval_ms: 2_000, slow_interval_ms: 5_000 }
}

fn default_ticket() -> PollScheduleConfig {
    PollScheduleConfig { max_attempts: 20, fast_attempts: 6, fast_interval_ms: 5_000, slow_interval_ms: 10_000 }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { verification: default_verification(), ticket: default_ticket() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResiliencyConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 { 5 }
fn default_reset_timeout() -> u64 { 30 }

impl Default for ResiliencyConfig {
    fn default() -> Self {
        Self { failure_threshold: default_failure_threshold(), reset_timeout_secs: default_reset_timeout() }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `SKYWARD__BACKEND__BASE_URL=https://...`
            .add_source(config::Environment::with_prefix("SKYWARD").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
