//! Manages application configuration loaded from environment variables.
//!
//! This module defines the `Config` struct which holds all runtime settings
//! and provides the `from_env` function to populate this struct. It supports
//! loading variables from a `.env` file via the `dotenv` crate and provides
//! default values for optional settings.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Holds the application's runtime configuration settings.
///
/// These settings are typically loaded from environment variables via `from_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The address the SMTP server should listen on. (Optional: `SMTP_HOST`, Default: "localhost")
    pub smtp_host: String,

    /// The network port the SMTP server should listen on. (Optional: `SMTP_PORT`, Default: 1025)
    pub smtp_port: u16,

    /// The hostname advertised in the greeting and HELO replies. (Optional: `SMTP_SERVER_NAME`, Default: "test")
    pub server_name: String,

    /// Command-mode line length cap in bytes, per RFC 5321 §4.5.3.1. (Optional: `SMTP_MAX_LINE_LEN`, Default: 1000)
    pub max_line_len: usize,

    /// DATA body size cap in bytes. (Optional: `SMTP_MAX_DATA_BYTES`, Default: 10485760)
    pub max_data_bytes: usize,

    /// Idle read timeout, per RFC 5321 §4.5.3.2. (Optional: `SMTP_READ_TIMEOUT_SECS`, Default: 300)
    pub read_timeout_secs: u64,

    /// The address the health check HTTP server should listen on. (Optional: `SMTP_HEALTH_BIND_ADDRESS`, Default: "0.0.0.0")
    pub health_bind_address: String,

    /// The network port the health check HTTP server should listen on. (Optional: `SMTP_HEALTH_PORT`, Default: 8080)
    pub health_port: u16,

    /// The URL completed envelopes are forwarded to as JSON. When absent, the
    /// server runs with a logging-only sink. (Optional: `SMTP_WEBHOOK_URL`)
    pub webhook_url: Option<String>,
}

impl Config {
    /// Loads configuration settings from environment variables.
    ///
    /// Reads variables prefixed with `SMTP_`. Supports loading from a `.env`
    /// file if present. Provides default values for every setting except
    /// none are strictly required (a bare server with a logging sink is a
    /// valid configuration).
    ///
    /// # Errors
    ///
    /// Returns an `Err` if any numeric setting is present but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self> {
        // Attempt to load variables from a .env file, if it exists. Ignore errors.
        let _ = dotenv::dotenv();

        let smtp_host = env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());
        log::info!("Config: Using smtp_host: {}", smtp_host);

        let smtp_port = parse_env_or("SMTP_PORT", 1025)?;
        log::info!("Config: Using smtp_port: {}", smtp_port);

        let server_name = env::var("SMTP_SERVER_NAME").unwrap_or_else(|_| "test".to_string());
        log::info!("Config: Using server_name: {}", server_name);

        let max_line_len = parse_env_or("SMTP_MAX_LINE_LEN", 1000usize)?;
        let max_data_bytes = parse_env_or("SMTP_MAX_DATA_BYTES", 10 * 1024 * 1024usize)?;
        let read_timeout_secs = parse_env_or("SMTP_READ_TIMEOUT_SECS", 300u64)?;
        log::info!(
            "Config: Using max_line_len: {}, max_data_bytes: {}, read_timeout_secs: {}",
            max_line_len,
            max_data_bytes,
            read_timeout_secs
        );

        let health_bind_address =
            env::var("SMTP_HEALTH_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());
        let health_port = parse_env_or("SMTP_HEALTH_PORT", 8080)?;
        log::info!(
            "Config: Using health_bind_address: {}, health_port: {}",
            health_bind_address,
            health_port
        );

        let webhook_url = env::var("SMTP_WEBHOOK_URL").ok();
        match &webhook_url {
            Some(url) => log::info!("Config: Using webhook_url: {}", url),
            None => log::info!("Config: No webhook_url set; envelopes will only be logged"),
        }

        Ok(Config {
            smtp_host,
            smtp_port,
            server_name,
            max_line_len,
            max_data_bytes,
            read_timeout_secs,
            health_bind_address,
            health_port,
            webhook_url,
        })
    }

    /// The idle read timeout as a `Duration`, for convenience at call sites.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Parses an environment variable with a default, producing a descriptive
/// error (naming the variable and the raw value) on a parse failure rather
/// than propagating the generic `ParseIntError`.
fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| anyhow!("{} ('{}') must be a valid number: {}", key, val, e)),
        Err(_) => Ok(default),
    }
}
