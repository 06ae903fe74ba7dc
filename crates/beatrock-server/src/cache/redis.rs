//! Redis backend for the shared tier.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use super::shared::SharedStore;
use crate::config::RedisConfig;
use crate::error::StoreError;

const SCAN_BATCH: usize = 500;

/// Claims the next spacing slot in one round trip. KEYS[1] holds the last
/// claimed slot in epoch milliseconds; ARGV is earliest, interval, ttl.
static RESERVE_SLOT: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
local last = tonumber(redis.call('GET', KEYS[1])) or 0
local slot = tonumber(ARGV[1])
local interval = tonumber(ARGV[2])
if last > 0 and last + interval > slot then
    slot = last + interval
end
redis.call('SET', KEYS[1], slot, 'PX', ARGV[3])
return slot
",
    )
});

/// Shared store backed by a process-wide deadpool-redis pool.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build the connection pool. Connections are opened lazily, so this
    /// succeeds even while Redis is down.
    pub fn from_config(config: &RedisConfig) -> Result<Self, StoreError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| StoreError::Backend(format!("failed to create Redis pool: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Close the pool; outstanding and future checkouts fail.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.pool.get().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        tracing::debug!(key = %key, hit = value.is_some(), "redis GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        tracing::debug!(key = %key, ttl_secs, "redis SET");
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut conn = self.pool.get().await?;
        let ttl_secs = ttl.as_secs().max(1) as i64;
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn reserve_slot(
        &self,
        key: &str,
        earliest_ms: u64,
        interval: Duration,
        ttl: Duration,
    ) -> Result<u64, StoreError> {
        let mut conn = self.pool.get().await?;
        let slot: u64 = RESERVE_SLOT
            .key(key)
            .arg(earliest_ms)
            .arg(interval.as_millis() as u64)
            .arg(ttl.as_millis().max(1) as u64)
            .invoke_async(&mut conn)
            .await?;
        tracing::debug!(key = %key, slot, "redis reserve slot");
        Ok(slot)
    }

    async fn counter(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.get().await?;
        let value: Option<u64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn count_keys(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut conn = self.pool.get().await?;
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut total = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            total += keys.len();
            if next == 0 {
                return Ok(total);
            }
            cursor = next;
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn mode(&self) -> &'static str {
        "redis"
    }
}
