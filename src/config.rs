use anyhow::{bail, Context, Result};
use std::{env, fmt, time::Duration};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-002";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// When a request is charged against the device's daily quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargePolicy {
    /// Check before the upstream call, charge only once a result was extracted.
    OnSuccess,
    /// Charge before the upstream call, even if the analysis later fails.
    UpFront,
}

impl std::str::FromStr for ChargePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on_success" => Ok(ChargePolicy::OnSuccess),
            "up_front" => Ok(ChargePolicy::UpFront),
            other => bail!("Unknown quota charge policy: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("Unknown usage store backend: {}", other),
        }
    }
}

#[derive(Clone)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub timeout: Duration,
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub usage_store: StoreBackend,
    pub upstream: UpstreamConfig,
    pub hmac_secret: Option<String>,
    pub allowed_origin: String,
    pub daily_limit: u32,
    pub charge_policy: ChargePolicy,
    pub max_body_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("redis_url", &self.redis_url)
            .field("usage_store", &self.usage_store)
            .field("upstream", &self.upstream)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "***"))
            .field("allowed_origin", &self.allowed_origin)
            .field("daily_limit", &self.daily_limit)
            .field("charge_policy", &self.charge_policy)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let daily_limit: u32 = env::var("DAILY_LIMIT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DAILY_LIMIT must be a non-negative integer")?;

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            usage_store: env::var("USAGE_STORE")
                .unwrap_or_else(|_| "redis".to_string())
                .parse()?,
            upstream: UpstreamConfig {
                api_key: env::var("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?,
                model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                api_base: env::var("GEMINI_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                max_retries: env::var("UPSTREAM_MAX_RETRIES")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                initial_delay: Duration::from_millis(
                    env::var("UPSTREAM_INITIAL_DELAY_MS")
                        .unwrap_or_else(|_| "1000".to_string())
                        .parse()?,
                ),
                timeout: Duration::from_secs(
                    env::var("UPSTREAM_TIMEOUT_SECS")
                        .unwrap_or_else(|_| "60".to_string())
                        .parse()?,
                ),
            },
            hmac_secret: env::var("HMAC_SECRET").ok().filter(|s| !s.is_empty()),
            allowed_origin: env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            daily_limit,
            charge_policy: env::var("QUOTA_CHARGE_POLICY")
                .unwrap_or_else(|_| "on_success".to_string())
                .parse()?,
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .unwrap_or_else(|_| "10485760".to_string()) // 10MB
                .parse()?,
        })
    }
}
