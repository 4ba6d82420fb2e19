use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::kernel::retry::RetryPolicy;

/// Default neighbourhood radius in meters.
pub const DEFAULT_RADIUS_METERS: f64 = 50_000.0;

/// Default cap on donors ledgered per request.
pub const DEFAULT_MAX_MATCHES: usize = 50;

/// Engine settings consumed by the dispatch actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    pub radius_m: f64,
    pub max_matches: usize,
    /// Bound on every individual store call.
    pub store_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_RADIUS_METERS,
            max_matches: DEFAULT_MAX_MATCHES,
            store_timeout: Duration::from_millis(2_000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres backend; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub dispatch: DispatchSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = DispatchSettings::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            dispatch: DispatchSettings {
                radius_m: parse_var("DISPATCH_RADIUS_METERS", defaults.radius_m)?,
                max_matches: parse_var("DISPATCH_MAX_MATCHES", defaults.max_matches)?,
                store_timeout: Duration::from_millis(parse_var("STORE_TIMEOUT_MS", 2_000)?),
                retry: RetryPolicy {
                    max_retries: parse_var("DISPATCH_MAX_RETRIES", defaults.retry.max_retries)?,
                    delay: Duration::from_millis(parse_var("DISPATCH_RETRY_DELAY_MS", 100)?),
                },
            },
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}
