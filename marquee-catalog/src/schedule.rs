use chrono::{NaiveDate, NaiveTime};
use marquee_core::catalog::{CatalogProvider, Movie};
use marquee_core::jobs::{Job, JobRunner};
use marquee_core::repository::{MovieStore, ShowRepository};
use marquee_core::show::{NewShow, Show};
use marquee_core::{BookingError, CoreResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default quiet period between two announcements of the same movie.
pub const ANNOUNCE_DEBOUNCE: Duration = Duration::from_secs(8);

/// One day of screenings as entered by an admin: `2025-07-24` with
/// `["10:00", "18:30"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowInput {
    pub date: String,
    pub time: Vec<String>,
}

/// Expands admin input into one show per (date, time) pair, interpreting the
/// wall-clock values as UTC.
pub fn build_shows(movie_id: &str, inputs: &[ShowInput], price_cents: i64) -> CoreResult<Vec<NewShow>> {
    if movie_id.trim().is_empty() {
        return Err(BookingError::InvalidRequest("movie_id is required".to_string()));
    }
    if price_cents <= 0 {
        return Err(BookingError::InvalidRequest("Show price must be positive".to_string()));
    }

    let mut shows = Vec::new();
    for input in inputs {
        let date = NaiveDate::parse_from_str(input.date.trim(), "%Y-%m-%d")
            .map_err(|_| BookingError::InvalidRequest(format!("Invalid show date {:?}", input.date)))?;

        for time in &input.time {
            let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
                .map_err(|_| BookingError::InvalidRequest(format!("Invalid show time {:?}", time)))?;
            shows.push(NewShow {
                movie_id: movie_id.to_string(),
                starts_at: date.and_time(time).and_utc(),
                price_cents,
            });
        }
    }

    if shows.is_empty() {
        return Err(BookingError::InvalidRequest("At least one show time is required".to_string()));
    }
    Ok(shows)
}

/// Suppresses repeated announcements of the same title inside a window.
/// Process-local; a second replica may announce once more.
pub struct AnnouncementDebouncer {
    window: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl AnnouncementDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    pub fn should_announce(&self, title: &str) -> bool {
        self.should_announce_at(title, Instant::now())
    }

    pub fn should_announce_at(&self, title: &str, at: Instant) -> bool {
        let mut last_sent = self.last_sent.lock();
        last_sent.retain(|_, sent| at.saturating_duration_since(*sent) < self.window);

        if last_sent.contains_key(title) {
            return false;
        }
        last_sent.insert(title.to_string(), at);
        true
    }
}

impl Default for AnnouncementDebouncer {
    fn default() -> Self {
        Self::new(ANNOUNCE_DEBOUNCE)
    }
}

/// Admin show creation.
pub struct ShowPlanner {
    shows: Arc<dyn ShowRepository>,
    movies: Arc<dyn MovieStore>,
    catalog: Arc<dyn CatalogProvider>,
    jobs: Arc<dyn JobRunner>,
    debouncer: AnnouncementDebouncer,
}

impl ShowPlanner {
    pub fn new(
        shows: Arc<dyn ShowRepository>,
        movies: Arc<dyn MovieStore>,
        catalog: Arc<dyn CatalogProvider>,
        jobs: Arc<dyn JobRunner>,
    ) -> Self {
        Self {
            shows,
            movies,
            catalog,
            jobs,
            debouncer: AnnouncementDebouncer::default(),
        }
    }

    pub fn with_debouncer(mut self, debouncer: AnnouncementDebouncer) -> Self {
        self.debouncer = debouncer;
        self
    }

    pub async fn add_shows(&self, movie_id: &str, inputs: &[ShowInput], price_cents: i64) -> CoreResult<Vec<Show>> {
        let new_shows = build_shows(movie_id, inputs, price_cents)?;
        let movie = self.ensure_movie(movie_id).await?;

        let created = self.shows.create_shows(new_shows).await?;
        tracing::info!(
            movie_id = %movie.id,
            count = created.len(),
            "Scheduled shows for {}",
            movie.title
        );

        if self.debouncer.should_announce(&movie.title) {
            let job = Job::AnnounceShow {
                movie_title: movie.title.clone(),
            };
            // Shows are already committed; a lost announcement is not worth failing the request.
            if let Err(e) = self.jobs.run_now(job).await {
                tracing::warn!("Failed to enqueue announcement for {}: {}", movie.title, e);
            }
        }

        Ok(created)
    }

    async fn ensure_movie(&self, movie_id: &str) -> CoreResult<Movie> {
        if let Some(movie) = self.movies.get_movie(movie_id).await? {
            return Ok(movie);
        }

        let movie = self.catalog.movie_details(movie_id).await?;
        self.movies.save_movie(&movie).await?;
        tracing::debug!(movie_id = %movie_id, "Stored catalog movie {}", movie.title);
        Ok(movie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn input(date: &str, times: &[&str]) -> ShowInput {
        ShowInput {
            date: date.to_string(),
            time: times.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_build_shows_one_per_date_time_pair() {
        let shows = build_shows(
            "550",
            &[input("2030-07-24", &["10:00", "18:30"]), input("2030-07-25", &["21:15"])],
            1250,
        )
        .unwrap();

        assert_eq!(shows.len(), 3);
        assert_eq!(shows[0].starts_at, Utc.with_ymd_and_hms(2030, 7, 24, 10, 0, 0).unwrap());
        assert_eq!(shows[1].starts_at, Utc.with_ymd_and_hms(2030, 7, 24, 18, 30, 0).unwrap());
        assert_eq!(shows[2].starts_at, Utc.with_ymd_and_hms(2030, 7, 25, 21, 15, 0).unwrap());
        assert!(shows.iter().all(|s| s.price_cents == 1250 && s.movie_id == "550"));
    }

    #[test]
    fn test_build_shows_rejects_bad_input() {
        assert!(build_shows("550", &[input("24/07/2030", &["10:00"])], 100).is_err());
        assert!(build_shows("550", &[input("2030-07-24", &["25:00"])], 100).is_err());
        assert!(build_shows("550", &[input("2030-07-24", &[])], 100).is_err());
        assert!(build_shows("550", &[input("2030-07-24", &["10:00"])], 0).is_err());
        assert!(build_shows(" ", &[input("2030-07-24", &["10:00"])], 100).is_err());
    }

    #[test]
    fn test_debouncer_suppresses_within_window() {
        let debouncer = AnnouncementDebouncer::new(Duration::from_secs(8));
        let start = Instant::now();

        assert!(debouncer.should_announce_at("Dune", start));
        assert!(!debouncer.should_announce_at("Dune", start + Duration::from_secs(3)));
        assert!(debouncer.should_announce_at("Arrival", start + Duration::from_secs(3)));
        assert!(debouncer.should_announce_at("Dune", start + Duration::from_secs(9)));
    }
}
