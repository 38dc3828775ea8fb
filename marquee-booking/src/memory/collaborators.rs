use async_trait::async_trait;
use marquee_core::catalog::{CatalogProvider, Movie, MovieSummary};
use marquee_core::events::EventPublisher;
use marquee_core::notify::{Email, Mailer};
use marquee_core::payment::{CheckoutRequest, CheckoutSession, PaymentGateway};
use marquee_core::{BookingError, CoreResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// Checkout provider stand-in. Session ids embed the booking id.
#[derive(Default)]
pub struct MockPaymentGateway {
    failing: AtomicBool,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_session(&self, request: &CheckoutRequest) -> CoreResult<CheckoutSession> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BookingError::GatewayFailure("Simulated payment provider outage".to_string()));
        }
        self.requests.lock().push(request.clone());

        let session_id = format!("cs_mock_{}", request.booking_id.simple());
        Ok(CheckoutSession {
            redirect_url: format!("https://checkout.mock/pay/{}", session_id),
            session_id,
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    rejected: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries to this address fail.
    pub fn reject(&self, address: &str) {
        self.rejected.lock().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> CoreResult<()> {
        if self.rejected.lock().contains(&email.to) {
            return Err(BookingError::GatewayFailure(format!("Mailbox unavailable: {}", email.to)));
        }
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct RecordingEventPublisher {
    published: Mutex<Vec<PublishedEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PublishedEvent> {
        self.published.lock().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.published.lock().iter().map(|e| e.topic.clone()).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> CoreResult<()> {
        self.published.lock().push(PublishedEvent {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// Fixed catalog keyed by movie id.
#[derive(Default)]
pub struct StaticCatalog {
    movies: BTreeMap<String, Movie>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_movie(mut self, movie: Movie) -> Self {
        self.movies.insert(movie.id.clone(), movie);
        self
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn movie_details(&self, movie_id: &str) -> CoreResult<Movie> {
        self.movies
            .get(movie_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("Movie {}", movie_id)))
    }

    async fn now_playing(&self) -> CoreResult<Vec<MovieSummary>> {
        Ok(self
            .movies
            .values()
            .map(|m| MovieSummary {
                id: m.id.clone(),
                title: m.title.clone(),
                overview: m.overview.clone(),
                poster_path: m.poster_path.clone(),
                backdrop_path: m.backdrop_path.clone(),
                release_date: m.release_date.clone(),
                vote_average: m.vote_average,
            })
            .collect())
    }
}

pub fn sample_movie(id: &str, title: &str) -> Movie {
    Movie {
        id: id.to_string(),
        title: title.to_string(),
        overview: format!("{} overview", title),
        poster_path: Some(format!("/{}.jpg", id)),
        backdrop_path: None,
        release_date: Some("2024-03-01".to_string()),
        original_language: Some("en".to_string()),
        tagline: None,
        genres: Vec::new(),
        casts: Vec::new(),
        vote_average: 7.5,
        runtime: Some(120),
    }
}
