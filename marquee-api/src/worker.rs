use chrono::Utc;
use marquee_booking::JobDispatcher;
use marquee_core::jobs::{Job, JobRunner};
use marquee_store::{QueuedJob, RedisJobQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::metrics::Metrics;

/// Pulls due jobs from the Redis queue and runs them through the dispatcher.
/// A failed job is handed back to the queue, which schedules the retry.
pub struct JobWorker {
    queue: RedisJobQueue,
    dispatcher: Arc<JobDispatcher>,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
    batch_size: usize,
}

impl JobWorker {
    pub fn new(
        queue: RedisJobQueue,
        dispatcher: Arc<JobDispatcher>,
        metrics: Arc<Metrics>,
        poll_interval: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            metrics,
            poll_interval,
            batch_size,
        }
    }

    pub async fn run(self) {
        info!("Job worker started, polling every {:?}", self.poll_interval);

        loop {
            let claimed = match self.queue.claim(Utc::now(), self.batch_size).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    error!("Failed to claim jobs: {}", e);
                    sleep(self.poll_interval).await;
                    continue;
                }
            };

            if claimed.is_empty() {
                sleep(self.poll_interval).await;
                continue;
            }
            for queued in claimed {
                self.process(queued).await;
            }
        }
    }

    async fn process(&self, queued: QueuedJob) {
        let job_id = queued.id;
        let result = self.dispatcher.dispatch(&queued.job).await;
        self.metrics.observe_job(queued.job.name(), &result);

        let settled = match result {
            Ok(outcome) => {
                debug!(job_id = %job_id, job = queued.job.name(), "Job done: {:?}", outcome);
                self.queue.ack(job_id).await
            }
            Err(e) => self.queue.nack(queued, &e, Utc::now()).await,
        };
        // The lease runs out and the job is redelivered.
        if let Err(e) = settled {
            error!(job_id = %job_id, "Failed to settle job: {}", e);
        }
    }
}

/// Enqueues a reminder pass every `every`, starting immediately.
pub async fn run_reminder_schedule(jobs: Arc<dyn JobRunner>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match jobs.run_now(Job::SendShowReminders).await {
            Ok(job_id) => info!(job_id = %job_id, "Show reminders queued"),
            Err(e) => error!("Failed to queue show reminders: {}", e),
        }
    }
}
