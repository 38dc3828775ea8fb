use marquee_booking::memory::InMemoryBackend;
use marquee_booking::{PaymentOrchestrator, ReservationService};
use marquee_catalog::{Dashboard, ShowListing, ShowPlanner};
use marquee_core::catalog::CatalogProvider;
use marquee_core::jobs::JobRunner;
use marquee_core::repository::{BookingLedger, MovieStore, ShowInventory, ShowRepository, UserDirectory};
use marquee_store::RedisClient;
use std::sync::Arc;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Clone)]
pub struct WebhookSecrets {
    pub stripe: String,
    pub identity: String,
    pub tolerance_seconds: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub reservations: Arc<ReservationService>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub planner: Arc<ShowPlanner>,
    pub listing: Arc<ShowListing>,
    pub dashboard: Arc<Dashboard>,
    pub shows: Arc<dyn ShowRepository>,
    pub inventory: Arc<dyn ShowInventory>,
    pub ledger: Arc<dyn BookingLedger>,
    pub movies: Arc<dyn MovieStore>,
    pub users: Arc<dyn UserDirectory>,
    pub catalog: Arc<dyn CatalogProvider>,
    pub jobs: Arc<dyn JobRunner>,
    /// `None` disables rate limiting.
    pub limiter: Option<Arc<RedisClient>>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub webhooks: WebhookSecrets,
}

impl AppState {
    /// State over the in-memory backend, for running without external services.
    pub fn in_memory(
        backend: &InMemoryBackend,
        auth: AuthConfig,
        webhooks: WebhookSecrets,
    ) -> Result<Self, prometheus::Error> {
        Ok(Self {
            reservations: Arc::new(backend.reservation_service()),
            orchestrator: Arc::new(backend.orchestrator()),
            planner: Arc::new(ShowPlanner::new(
                backend.shows.clone(),
                backend.movies.clone(),
                backend.catalog.clone(),
                backend.jobs.clone(),
            )),
            listing: Arc::new(ShowListing::new(backend.shows.clone(), backend.movies.clone())),
            dashboard: Arc::new(Dashboard::new(
                backend.shows.clone(),
                backend.ledger.clone(),
                backend.movies.clone(),
                backend.users.clone(),
            )),
            shows: backend.shows.clone(),
            inventory: backend.shows.clone(),
            ledger: backend.ledger.clone(),
            movies: backend.movies.clone(),
            users: backend.users.clone(),
            catalog: backend.catalog.clone(),
            jobs: backend.jobs.clone(),
            limiter: None,
            metrics: Arc::new(Metrics::new()?),
            auth,
            webhooks,
        })
    }
}
