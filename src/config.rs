use crate::aggregator::DEFAULT_QUEUE_CAPACITY;
use crate::broadcast::DEFAULT_SUBSCRIBER_BUFFER;
use crate::error::ConfigError;
use std::net::SocketAddr;
use std::str::FromStr;

/// Server configuration read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// `None` mirrors the request origin.
    pub cors_origin: Option<String>,
    pub db_max_connections: u32,
    pub vote_queue_capacity: usize,
    pub subscriber_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000)))?,
            cors_origin: lookup("CORS_ORIGIN").filter(|origin| !origin.is_empty()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            vote_queue_capacity: parse_or(&lookup, "VOTE_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
            subscriber_buffer: parse_or(&lookup, "SUBSCRIBER_BUFFER", DEFAULT_SUBSCRIBER_BUFFER)?,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
