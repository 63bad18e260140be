// src/config.rs

use std::net::SocketAddr;

/// Runtime configuration, read from the environment (a `.env` file is
/// loaded first if present).
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. Required.
    pub database_url: String,
    /// Address the HTTP/websocket server binds to.
    pub bind_addr: SocketAddr,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|err| anyhow::anyhow!("invalid BIND_ADDR: {err}"))?;

        Ok(Self {
            database_url,
            bind_addr,
        })
    }
}
