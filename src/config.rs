use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub max_age_seconds: i64,
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub cache_ttl_seconds: u64,
    pub operation_timeout: Duration,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
        };
        let cookie = CookieConfig {
            name: std::env::var("JWT_COOKIE_NAME").unwrap_or_else(|_| "jwt-token".into()),
            max_age_seconds: env_or("COOKIE_MAX_AGE_SECONDS", 3600),
            secure: env_or("COOKIE_SECURE", false),
        };
        Ok(Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".into()),
            jwt,
            cookie,
            cache_ttl_seconds: env_or("ACCOUNT_CACHE_TTL_SECONDS", 3600),
            operation_timeout: Duration::from_secs(env_or("OPERATION_TIMEOUT_SECONDS", 15)),
        })
    }
}
