use std::env::VarError;
use std::net::SocketAddr;

use crate::app_config::{AppConfig, Environment, UpstreamConfig};
use crate::env::EnvReader;
use crate::ConfigError;

const DEFAULT_UPSTREAM_URL: &str = "https://api.github.com";
const DEFAULT_USER_AGENT: &str = "folio/0.1 (portfolio-sync)";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Load upstream configuration from the current process environment.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_upstream_config_from_env() -> Result<UpstreamConfig, ConfigError> {
    build_upstream_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let env = EnvReader::new(lookup);

    let environment = parse_environment(&env.or_default("FOLIO_ENV", "development"))?;
    let bind_addr = env.parse::<SocketAddr>(
        "FOLIO_BIND_ADDR",
        SocketAddr::from(([0, 0, 0, 0], 8000)),
    )?;
    let rate_limit_window_secs = env.parse::<u64>("FOLIO_RATE_LIMIT_WINDOW_SECS", 60)?;
    if rate_limit_window_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "FOLIO_RATE_LIMIT_WINDOW_SECS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        database_url: env.optional("DATABASE_URL"),
        env: environment,
        bind_addr,
        log_level: env.or_default("FOLIO_LOG_LEVEL", "info"),
        owner: env.optional("FOLIO_OWNER"),
        db_max_connections: env.parse("FOLIO_DB_MAX_CONNECTIONS", 10)?,
        db_min_connections: env.parse("FOLIO_DB_MIN_CONNECTIONS", 1)?,
        db_acquire_timeout_secs: env.parse("FOLIO_DB_ACQUIRE_TIMEOUT_SECS", 10)?,
        api_keys: parse_api_keys(&env.or_default("FOLIO_API_KEYS", "")),
        upstream_route_limit: env.parse("FOLIO_UPSTREAM_ROUTE_LIMIT", 30)?,
        store_route_limit: env.parse("FOLIO_STORE_ROUTE_LIMIT", 120)?,
        rate_limit_window_secs,
    })
}

fn parse_api_keys(raw: &str) -> Vec<String> {
    let mut keys: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Build upstream configuration using the provided env-var lookup function.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid or the cache window is zero.
pub fn build_upstream_config<F>(lookup: F) -> Result<UpstreamConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let env = EnvReader::new(lookup);

    let cache_window_hours = env.parse::<u32>("FOLIO_CACHE_WINDOW_HOURS", 24)?;
    if cache_window_hours == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "FOLIO_CACHE_WINDOW_HOURS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(UpstreamConfig {
        base_url: env.or_default("GITHUB_API_URL", DEFAULT_UPSTREAM_URL),
        token: env.optional("GITHUB_TOKEN"),
        user_agent: env.or_default("GITHUB_USER_AGENT", DEFAULT_USER_AGENT),
        timeout_secs: env.parse("GITHUB_TIMEOUT_SECS", 30)?,
        max_retries: env.parse("GITHUB_MAX_RETRIES", 3)?,
        backoff_base_ms: env.parse("GITHUB_BACKOFF_BASE_MS", 1_000)?,
        max_backoff_ms: env.parse("GITHUB_MAX_BACKOFF_MS", 10_000)?,
        retry_budget_secs: env.parse("GITHUB_RETRY_BUDGET_SECS", 120)?,
        fetch_languages: env.parse_bool("GITHUB_FETCH_LANGUAGES", true)?,
        cache_window_hours,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FOLIO_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
