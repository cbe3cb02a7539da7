use crate::app_config::{AppConfig, Environment, MAX_LOG_RETENTION_DAYS};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn invalid(var: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_with<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| invalid(var, e))
}

/// Build application configuration from an env-var lookup function, so tests
/// can drive it from a plain `HashMap`.
pub(crate) fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("PRICEHIST_ENV", "development"));

    let bind_addr: SocketAddr = parse_with(
        "PRICEHIST_BIND_ADDR",
        &or_default("PRICEHIST_BIND_ADDR", "0.0.0.0:3000"),
    )?;
    let log_level = or_default("PRICEHIST_LOG_LEVEL", "info");
    let api_keys = parse_api_keys(&or_default("PRICEHIST_API_KEYS", ""));

    let db_max_connections: u32 = parse_with(
        "PRICEHIST_DB_MAX_CONNECTIONS",
        &or_default("PRICEHIST_DB_MAX_CONNECTIONS", "10"),
    )?;
    let db_min_connections: u32 = parse_with(
        "PRICEHIST_DB_MIN_CONNECTIONS",
        &or_default("PRICEHIST_DB_MIN_CONNECTIONS", "1"),
    )?;
    let db_acquire_timeout_secs: u64 = parse_with(
        "PRICEHIST_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("PRICEHIST_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;

    let log_retention_days: u32 = parse_with(
        "PRICEHIST_LOG_RETENTION_DAYS",
        &or_default("PRICEHIST_LOG_RETENTION_DAYS", "90"),
    )?;
    if !(1..=MAX_LOG_RETENTION_DAYS).contains(&log_retention_days) {
        return Err(invalid(
            "PRICEHIST_LOG_RETENTION_DAYS",
            format!("must be between 1 and {MAX_LOG_RETENTION_DAYS}"),
        ));
    }

    let purge_batch_size: i64 = parse_with(
        "PRICEHIST_PURGE_BATCH_SIZE",
        &or_default("PRICEHIST_PURGE_BATCH_SIZE", "100"),
    )?;
    if purge_batch_size < 1 {
        return Err(invalid("PRICEHIST_PURGE_BATCH_SIZE", "must be at least 1"));
    }

    let purge_cron = or_default("PRICEHIST_PURGE_CRON", "0 0 3 * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        api_keys,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        log_retention_days,
        purge_batch_size,
        purge_cron,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
pub(crate) fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
