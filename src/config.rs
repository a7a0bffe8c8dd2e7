// src/config.rs

use std::{env, fmt};

use dotenvy::dotenv;

use crate::forum::ThreadSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    /// Seeded as a forum admin on startup when set.
    pub admin_address: Option<String>,
    /// Deepest generation a reply may be posted at (the proposal root is 0).
    pub comment_max_depth: i64,
    /// Page size per nesting level of a comment thread.
    pub comment_page_sizes: Vec<usize>,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has an invalid value: '{}'", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;

        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION", 86_400)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let admin_address = env::var("ADMIN_ADDRESS").ok().filter(|a| !a.is_empty());

        let comment_max_depth = parsed("COMMENT_MAX_DEPTH", ThreadSettings::DEFAULT_MAX_DEPTH)?;

        let comment_page_sizes = match env::var("COMMENT_PAGE_SIZES") {
            Ok(raw) => parse_page_sizes(&raw).ok_or(ConfigError::Invalid {
                key: "COMMENT_PAGE_SIZES",
                value: raw,
            })?,
            Err(_) => ThreadSettings::DEFAULT_PAGE_SIZES.to_vec(),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            admin_address,
            comment_max_depth,
            comment_page_sizes,
        })
    }

    /// Immutable thread settings handed to the forum engine.
    pub fn thread_settings(&self) -> ThreadSettings {
        ThreadSettings {
            max_depth: self.comment_max_depth,
            page_sizes: self.comment_page_sizes.clone(),
        }
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// Parses a comma list such as `10,5,3,3`. Empty lists and zero sizes are rejected.
fn parse_page_sizes(raw: &str) -> Option<Vec<usize>> {
    let sizes = raw
        .split(',')
        .map(|part| part.trim().parse::<usize>().ok().filter(|size| *size > 0))
        .collect::<Option<Vec<_>>>()?;

    if sizes.is_empty() { None } else { Some(sizes) }
}
