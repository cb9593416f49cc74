//! Redis implementation of the shared store.
//!
//! Wraps a multiplexed connection manager: every call clones the manager
//! handle, so commands never contend on a single connection and reconnects
//! happen behind the scenes.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::FromRedisValue;
use tokio::time::timeout;

use crate::error::{StoreError, StoreResult};

use super::{SharedStore, STORE_TIMEOUT};

/// Shared store backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Opens a managed connection to the Redis server at `url`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { manager })
    }

    /// Runs a command under the per-call deadline.
    async fn run<T>(&self, cmd: &redis::Cmd) -> StoreResult<T>
    where
        T: FromRedisValue,
    {
        let mut conn = self.manager.clone();
        match timeout(STORE_TIMEOUT, cmd.query_async(&mut conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StoreError::Command(err.to_string())),
            Err(_) => Err(StoreError::Timeout(STORE_TIMEOUT)),
        }
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> StoreResult<()> {
        let _: String = self.run(&redis::cmd("PING")).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.run(redis::cmd("GET").arg(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        // EX 0 is a command error, clamp to at least one second
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = self
            .run(redis::cmd("SET").arg(key).arg(value).arg("EX").arg(ttl_secs))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        self.run(redis::cmd("DEL").arg(key)).await
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.run(redis::cmd("KEYS").arg(pattern)).await
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<u64> {
        // DEL with no arguments is a command error
        if keys.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        self.run(&cmd).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let _: u64 = self
            .run(redis::cmd("ZADD").arg(key).arg(score).arg(member))
            .await?;
        Ok(())
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        self.run(redis::cmd("ZCARD").arg(key)).await
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<Vec<String>> {
        self.run(redis::cmd("ZRANGEBYSCORE").arg(key).arg(min).arg(max))
            .await
    }

    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64> {
        self.run(redis::cmd("ZREMRANGEBYSCORE").arg(key).arg(min).arg(max))
            .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let ttl_secs = ttl.as_secs().max(1);
        let _: i64 = self.run(redis::cmd("EXPIRE").arg(key).arg(ttl_secs)).await?;
        Ok(())
    }
}
