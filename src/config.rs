//! Typed configuration from environment variables.
//!
//! Loads once at startup; everything has a sensible default, and malformed
//! values fail fast instead of being silently replaced.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub bind_addr: SocketAddr,
    /// SQLite path, or `:memory:` for the throwaway catalog.
    pub db_path: String,
    /// Time between lifecycle sweeps.
    pub tick_interval: Duration,
    /// Optional OTLP endpoint (e.g. "http://localhost:4317").
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let bind_addr = var_or("WORKSHOPD_ADDR", "127.0.0.1:3001");
        let bind_addr = bind_addr
            .parse()
            .map_err(|_| Error::Config(format!("WORKSHOPD_ADDR is not an address: {bind_addr}")))?;

        let tick_secs = var_or("WORKSHOPD_TICK_SECS", "30");
        let tick_secs: u64 = tick_secs
            .parse()
            .map_err(|_| Error::Config(format!("WORKSHOPD_TICK_SECS is not a number: {tick_secs}")))?;
        if tick_secs == 0 {
            return Err(Error::Config("WORKSHOPD_TICK_SECS must be positive".into()));
        }

        Ok(Self {
            bind_addr,
            db_path: var_or("WORKSHOPD_DB", ":memory:"),
            tick_interval: Duration::from_secs(tick_secs),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: var_or("LOG_LEVEL", "info"),
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
