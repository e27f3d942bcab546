use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::Account;

const KEY_PREFIX: &str = "api-auth:";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache call timed out")]
    Timeout,
}

pub fn account_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// Read-through cache of sanitized accounts. Never authoritative.
#[async_trait]
pub trait AccountCache: Send + Sync {
    async fn get_by_id(&self, key: &str) -> Result<Option<Account>, CacheError>;
    async fn set(&self, key: &str, ttl_seconds: u64, account: &Account) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Round trip used by the readiness check.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Redis-backed cache; the connection manager multiplexes and reconnects.
#[derive(Clone)]
pub struct RedisAccountCache {
    conn: ConnectionManager,
}

impl RedisAccountCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl AccountCache for RedisAccountCache {
    async fn get_by_id(&self, key: &str) -> Result<Option<Account>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, ttl_seconds: u64, account: &Account) -> Result<(), CacheError> {
        let json = serde_json::to_string(account)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, json, ttl_seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
