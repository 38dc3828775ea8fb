use redis::{AsyncCommands, RedisResult};
use tracing::debug;

/// The first request of a window sets the expiry. A counter left without a
/// TTL (`-1`) gets one too, so a lost EXPIRE cannot pin the key forever.
fn window_needs_expiry(count: i64, ttl: i64) -> bool {
    count == 1 || ttl == -1
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub(crate) fn client(&self) -> &redis::Client {
        &self.client
    }

    /// Fixed-window counter. Returns `true` while the caller is within `limit`.
    /// The window starts at the first request and is never extended.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count, ttl): (i64, i64) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .ttl(key)
            .query_async(&mut conn)
            .await?;

        if window_needs_expiry(count, ttl) {
            let _: bool = conn.expire(key, window_seconds).await?;
        }

        if count > limit {
            debug!("Rate limit exceeded for {} ({} > {})", key, count, limit);
        }
        Ok(count <= limit)
    }

    pub async fn get_cached(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    pub async fn set_cached(&self, key: &str, value: &str, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
