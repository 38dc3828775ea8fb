//! In-memory implementations of every storage and collaborator trait. They
//! back the test suites and the API when it runs without external services.

mod collaborators;
mod directory;
mod jobs;
mod ledger;
mod shows;

pub use collaborators::{
    sample_movie, MockPaymentGateway, PublishedEvent, RecordingEventPublisher, RecordingMailer, StaticCatalog,
};
pub use directory::{InMemoryMovieStore, InMemoryUserDirectory};
pub use jobs::{InMemoryJobRunner, ScheduledJob};
pub use ledger::InMemoryLedger;
pub use shows::InMemoryShowStore;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use marquee_core::show::Show;
use std::sync::Arc;
use uuid::Uuid;

use crate::dispatch::{DispatchOutcome, JobDispatcher};
use crate::notifications::{Notifier, ReminderWindow};
use crate::orchestrator::PaymentOrchestrator;
use crate::policy::ReservationPolicy;
use crate::reservation::ReservationService;
use crate::sweeper::ExpirySweeper;
use crate::user_sync::UserSync;
use marquee_core::CoreResult;

/// Every in-memory store wired together, with constructors for the services
/// that run on top of them.
#[derive(Clone)]
pub struct InMemoryBackend {
    pub shows: Arc<InMemoryShowStore>,
    pub ledger: Arc<InMemoryLedger>,
    pub jobs: Arc<InMemoryJobRunner>,
    pub movies: Arc<InMemoryMovieStore>,
    pub users: Arc<InMemoryUserDirectory>,
    pub gateway: Arc<MockPaymentGateway>,
    pub mailer: Arc<RecordingMailer>,
    pub events: Arc<RecordingEventPublisher>,
    pub catalog: Arc<StaticCatalog>,
    pub policy: ReservationPolicy,
    pub sweep_retry: Duration,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_catalog(StaticCatalog::new())
    }

    pub fn with_catalog(catalog: StaticCatalog) -> Self {
        Self {
            shows: Arc::new(InMemoryShowStore::new()),
            ledger: Arc::new(InMemoryLedger::new()),
            jobs: Arc::new(InMemoryJobRunner::new()),
            movies: Arc::new(InMemoryMovieStore::new()),
            users: Arc::new(InMemoryUserDirectory::new()),
            gateway: Arc::new(MockPaymentGateway::new()),
            mailer: Arc::new(RecordingMailer::new()),
            events: Arc::new(RecordingEventPublisher::new()),
            catalog: Arc::new(catalog),
            policy: ReservationPolicy::default(),
            sweep_retry: Duration::seconds(30),
        }
    }

    /// Inserts a show starting tomorrow.
    pub fn add_show(&self, movie_id: &str, price_cents: i64) -> Show {
        let show = Show {
            id: Uuid::new_v4(),
            movie_id: movie_id.to_string(),
            starts_at: Utc::now() + Duration::days(1),
            price_cents,
            created_at: Utc::now(),
        };
        self.shows.insert_show(show.clone());
        show
    }

    pub fn reservation_service(&self) -> ReservationService {
        ReservationService::new(
            self.shows.clone(),
            self.shows.clone(),
            self.ledger.clone(),
            self.gateway.clone(),
            self.jobs.clone(),
            self.movies.clone(),
            self.events.clone(),
            self.policy.clone(),
        )
    }

    pub fn orchestrator(&self) -> PaymentOrchestrator {
        PaymentOrchestrator::new(self.ledger.clone(), self.jobs.clone(), self.events.clone())
    }

    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            self.ledger.clone(),
            self.shows.clone(),
            self.jobs.clone(),
            self.events.clone(),
            self.sweep_retry,
        )
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::new(
            self.ledger.clone(),
            self.shows.clone(),
            self.movies.clone(),
            self.users.clone(),
            self.mailer.clone(),
            Tz::Asia__Kolkata,
            ReminderWindow::default(),
        )
    }

    pub fn dispatcher(&self) -> JobDispatcher {
        JobDispatcher::new(
            Arc::new(self.sweeper()),
            Arc::new(self.notifier()),
            Arc::new(UserSync::new(self.users.clone())),
            self.shows.clone(),
        )
    }

    /// Runs every job due at `now` once, the way a worker pass would.
    /// Jobs scheduled by the handlers themselves wait for the next pass.
    pub async fn run_due_jobs(&self, now: DateTime<Utc>) -> Vec<CoreResult<DispatchOutcome>> {
        let dispatcher = self.dispatcher();
        let mut results = Vec::new();
        for scheduled in self.jobs.take_due(now) {
            results.push(dispatcher.dispatch(&scheduled.job).await);
        }
        results
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}
