use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::jobs::{Job, JobRunner};
use marquee_core::{BookingError, CoreResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub job: Job,
    pub fire_at: DateTime<Utc>,
}

/// Job queue that only moves when a test drains it.
#[derive(Default)]
pub struct InMemoryJobRunner {
    queue: Mutex<Vec<ScheduledJob>>,
    failing: AtomicBool,
}

impl InMemoryJobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn scheduled(&self) -> Vec<ScheduledJob> {
        self.queue.lock().clone()
    }

    /// Removes and returns every job due at `now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<ScheduledJob> {
        let mut queue = self.queue.lock();
        let (mut due, rest): (Vec<_>, Vec<_>) = queue.drain(..).partition(|j| j.fire_at <= now);
        *queue = rest;
        due.sort_by_key(|j| j.fire_at);
        due
    }
}

#[async_trait]
impl JobRunner for InMemoryJobRunner {
    async fn schedule_at(&self, job: Job, fire_at: DateTime<Utc>) -> CoreResult<Uuid> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BookingError::Storage("Job queue unavailable".to_string()));
        }
        let id = Uuid::new_v4();
        self.queue.lock().push(ScheduledJob { id, job, fire_at });
        Ok(id)
    }
}
