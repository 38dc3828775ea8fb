use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marquee_core::jobs::{Job, JobRunner};
use marquee_core::{BookingError, CoreResult};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::redis_repo::RedisClient;

const SCHEDULED_KEY: &str = "jobs:scheduled";
const LEASED_KEY: &str = "jobs:leased";
const PAYLOAD_KEY: &str = "jobs:payload";
const DEAD_KEY: &str = "jobs:dead";

/// Deliveries before a job is parked in the dead-letter set.
pub const MAX_ATTEMPTS: u32 = 5;

/// A job as stored in Redis, with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: Job,
    #[serde(default)]
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Exponential backoff for the next delivery: 5s, 10s, 20s ... capped at 5 minutes.
pub fn retry_delay(attempts: u32) -> Duration {
    let seconds = 5i64.saturating_mul(1i64 << attempts.min(16));
    Duration::seconds(seconds.min(300))
}

// Returns due jobs as a flat [id, body, id, body, ...] list. Leases that ran
// out are put back first so crashed workers do not lose jobs.
const CLAIM_SCRIPT: &str = r#"
    local lapsed = redis.call("ZRANGEBYSCORE", KEYS[2], "-inf", ARGV[1])
    for _, id in ipairs(lapsed) do
        redis.call("ZREM", KEYS[2], id)
        redis.call("ZADD", KEYS[1], ARGV[1], id)
    end

    local due = redis.call("ZRANGEBYSCORE", KEYS[1], "-inf", ARGV[1], "LIMIT", 0, ARGV[3])
    local out = {}
    for _, id in ipairs(due) do
        redis.call("ZREM", KEYS[1], id)
        local body = redis.call("HGET", KEYS[3], id)
        if body then
            redis.call("ZADD", KEYS[2], ARGV[2], id)
            table.insert(out, id)
            table.insert(out, body)
        end
    end
    return out
"#;

/// Delayed job queue on Redis sorted sets. Delivery is at-least-once: a
/// claimed job is leased, and comes back if it is not acknowledged before the
/// lease runs out.
#[derive(Clone)]
pub struct RedisJobQueue {
    redis: RedisClient,
    lease: Duration,
}

impl RedisJobQueue {
    pub fn new(redis: RedisClient, lease: Duration) -> Self {
        Self { redis, lease }
    }

    async fn enqueue(&self, queued: &QueuedJob, fire_at: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.redis.client().get_multiplexed_async_connection().await?;
        let body = serde_json::to_string(queued)?;
        let id = queued.id.to_string();

        redis::pipe()
            .atomic()
            .hset(PAYLOAD_KEY, &id, body)
            .ignore()
            .zadd(SCHEDULED_KEY, &id, fire_at.timestamp_millis())
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Claims up to `limit` jobs due at `now`.
    pub async fn claim(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<QueuedJob>> {
        let mut conn = self.redis.client().get_multiplexed_async_connection().await?;
        let deadline = now + self.lease;

        let flat: Vec<String> = redis::Script::new(CLAIM_SCRIPT)
            .key(SCHEDULED_KEY)
            .key(LEASED_KEY)
            .key(PAYLOAD_KEY)
            .arg(now.timestamp_millis())
            .arg(deadline.timestamp_millis())
            .arg(limit)
            .invoke_async(&mut conn)
            .await?;

        let mut claimed = Vec::with_capacity(flat.len() / 2);
        for pair in flat.chunks(2) {
            let [id, body] = pair else { continue };
            match serde_json::from_str::<QueuedJob>(body) {
                Ok(queued) => claimed.push(queued),
                Err(e) => {
                    error!("Unreadable job {} moved to dead letters: {}", id, e);
                    self.bury(id, now).await?;
                }
            }
        }
        Ok(claimed)
    }

    pub async fn ack(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.redis.client().get_multiplexed_async_connection().await?;
        let id = id.to_string();
        redis::pipe()
            .atomic()
            .zrem(LEASED_KEY, &id)
            .ignore()
            .hdel(PAYLOAD_KEY, &id)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Records a failed delivery. Retryable failures are rescheduled with
    /// backoff until `MAX_ATTEMPTS`; anything else goes to the dead letters.
    pub async fn nack(&self, mut queued: QueuedJob, err: &BookingError, now: DateTime<Utc>) -> StoreResult<()> {
        queued.attempts += 1;
        let id = queued.id.to_string();

        if !err.is_retryable() || queued.attempts >= MAX_ATTEMPTS {
            error!(job_id = %queued.id, job = queued.job.name(), attempts = queued.attempts, "Job dead-lettered: {}", err);
            let mut conn = self.redis.client().get_multiplexed_async_connection().await?;
            redis::pipe()
                .atomic()
                .hset(PAYLOAD_KEY, &id, serde_json::to_string(&queued)?)
                .ignore()
                .query_async::<()>(&mut conn)
                .await?;
            return self.bury(&id, now).await;
        }

        let next = now + retry_delay(queued.attempts);
        warn!(job_id = %queued.id, job = queued.job.name(), attempts = queued.attempts, "Job failed, retrying at {}: {}", next, err);

        let mut conn = self.redis.client().get_multiplexed_async_connection().await?;
        redis::pipe()
            .atomic()
            .hset(PAYLOAD_KEY, &id, serde_json::to_string(&queued)?)
            .ignore()
            .zrem(LEASED_KEY, &id)
            .ignore()
            .zadd(SCHEDULED_KEY, &id, next.timestamp_millis())
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn bury(&self, id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.redis.client().get_multiplexed_async_connection().await?;
        redis::pipe()
            .atomic()
            .zrem(LEASED_KEY, id)
            .ignore()
            .zadd(DEAD_KEY, id, now.timestamp_millis())
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobRunner for RedisJobQueue {
    async fn schedule_at(&self, job: Job, fire_at: DateTime<Utc>) -> CoreResult<Uuid> {
        let queued = QueuedJob {
            id: Uuid::new_v4(),
            job,
            attempts: 0,
            enqueued_at: Utc::now(),
        };
        self.enqueue(&queued, fire_at).await?;
        info!(job_id = %queued.id, job = queued.job.name(), "Job scheduled for {}", fire_at);
        Ok(queued.id)
    }
}
