use chrono::{DateTime, Utc};
use marquee_core::catalog::Movie;
use marquee_core::repository::{MovieStore, ShowRepository};
use marquee_core::show::{Show, ShowId};
use marquee_core::{BookingError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowTime {
    pub time: DateTime<Utc>,
    pub show_id: ShowId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSchedule {
    pub movie: Movie,
    /// Keyed by `YYYY-MM-DD`, times ascending.
    pub date_time: BTreeMap<String, Vec<ShowTime>>,
}

pub fn group_by_date(shows: &[Show]) -> BTreeMap<String, Vec<ShowTime>> {
    let mut grouped: BTreeMap<String, Vec<ShowTime>> = BTreeMap::new();
    for show in shows {
        grouped
            .entry(show.starts_at.format("%Y-%m-%d").to_string())
            .or_default()
            .push(ShowTime {
                time: show.starts_at,
                show_id: show.id,
            });
    }
    for times in grouped.values_mut() {
        times.sort_by_key(|t| t.time);
    }
    grouped
}

/// Read side of the show catalog for the public pages.
pub struct ShowListing {
    shows: Arc<dyn ShowRepository>,
    movies: Arc<dyn MovieStore>,
}

impl ShowListing {
    pub fn new(shows: Arc<dyn ShowRepository>, movies: Arc<dyn MovieStore>) -> Self {
        Self { shows, movies }
    }

    /// Distinct movies that still have a show ahead, in order of their next show.
    pub async fn upcoming_movies(&self, now: DateTime<Utc>) -> CoreResult<Vec<Movie>> {
        let shows = self.shows.list_upcoming(now).await?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = shows
            .into_iter()
            .filter(|show| seen.insert(show.movie_id.clone()))
            .map(|show| show.movie_id)
            .collect();

        let mut by_id: BTreeMap<String, Movie> = self
            .movies
            .get_movies(&ids)
            .await?
            .into_iter()
            .map(|movie| (movie.id.clone(), movie))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    pub async fn movie_schedule(&self, movie_id: &str, now: DateTime<Utc>) -> CoreResult<MovieSchedule> {
        let movie = self
            .movies
            .get_movie(movie_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Movie {}", movie_id)))?;

        let shows = self.shows.list_upcoming_for_movie(movie_id, now).await?;
        Ok(MovieSchedule {
            movie,
            date_time: group_by_date(&shows),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn show_at(movie_id: &str, y: i32, m: u32, d: u32, h: u32) -> Show {
        Show {
            id: Uuid::new_v4(),
            movie_id: movie_id.to_string(),
            starts_at: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            price_cents: 100,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_group_by_date_sorts_times_within_a_day() {
        let late = show_at("1", 2030, 1, 2, 20);
        let early = show_at("1", 2030, 1, 2, 9);
        let next_day = show_at("1", 2030, 1, 3, 9);

        let grouped = group_by_date(&[late.clone(), next_day.clone(), early.clone()]);

        assert_eq!(grouped.keys().cloned().collect::<Vec<_>>(), vec!["2030-01-02", "2030-01-03"]);
        let day = &grouped["2030-01-02"];
        assert_eq!(day[0].show_id, early.id);
        assert_eq!(day[1].show_id, late.id);
        assert_eq!(grouped["2030-01-03"][0].show_id, next_day.id);
    }
}
