use chrono::{DateTime, Utc};
use marquee_core::booking::Booking;
use marquee_core::catalog::Movie;
use marquee_core::repository::{BookingLedger, MovieStore, ShowRepository, UserDirectory};
use marquee_core::seat::SeatLabel;
use marquee_core::show::{Show, ShowId};
use marquee_core::CoreResult;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminShow {
    pub show: Show,
    pub movie: Option<Movie>,
    /// Seats of paid bookings only; pending holds are not sales.
    pub booked_seats: Vec<SeatLabel>,
    pub earnings_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminBooking {
    pub booking: Booking,
    pub user_name: Option<String>,
    pub movie_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_bookings: usize,
    pub total_revenue_cents: i64,
    pub active_shows: Vec<AdminShow>,
    pub total_users: u64,
}

/// Paid booking count and revenue.
pub fn revenue(paid: &[Booking]) -> (usize, i64) {
    (paid.len(), paid.iter().map(|b| b.amount_cents).sum())
}

fn admin_shows(shows: Vec<Show>, movies: &HashMap<String, Movie>, paid: &[Booking]) -> Vec<AdminShow> {
    let mut seats_by_show: HashMap<ShowId, BTreeSet<SeatLabel>> = HashMap::new();
    let mut earnings_by_show: HashMap<ShowId, i64> = HashMap::new();
    for booking in paid {
        seats_by_show
            .entry(booking.show_id)
            .or_default()
            .extend(booking.seats.iter().cloned());
        *earnings_by_show.entry(booking.show_id).or_default() += booking.amount_cents;
    }

    shows
        .into_iter()
        .map(|show| AdminShow {
            movie: movies.get(&show.movie_id).cloned(),
            booked_seats: seats_by_show
                .remove(&show.id)
                .map(|s| s.into_iter().collect())
                .unwrap_or_default(),
            earnings_cents: earnings_by_show.get(&show.id).copied().unwrap_or(0),
            show,
        })
        .collect()
}

/// Admin reporting over shows, bookings and users.
pub struct Dashboard {
    shows: Arc<dyn ShowRepository>,
    ledger: Arc<dyn BookingLedger>,
    movies: Arc<dyn MovieStore>,
    users: Arc<dyn UserDirectory>,
}

impl Dashboard {
    pub fn new(
        shows: Arc<dyn ShowRepository>,
        ledger: Arc<dyn BookingLedger>,
        movies: Arc<dyn MovieStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            shows,
            ledger,
            movies,
            users,
        }
    }

    pub async fn summary(&self, now: DateTime<Utc>) -> CoreResult<DashboardSummary> {
        let paid = self.ledger.list_paid().await?;
        let (total_bookings, total_revenue_cents) = revenue(&paid);
        let active_shows = self.all_shows(now).await?;
        let total_users = self.users.count().await?;

        Ok(DashboardSummary {
            total_bookings,
            total_revenue_cents,
            active_shows,
            total_users,
        })
    }

    pub async fn all_shows(&self, now: DateTime<Utc>) -> CoreResult<Vec<AdminShow>> {
        let shows = self.shows.list_upcoming(now).await?;
        let show_ids: Vec<ShowId> = shows.iter().map(|s| s.id).collect();
        let paid = self.ledger.paid_for_shows(&show_ids).await?;
        let movies = self.movies_for(&shows).await?;

        Ok(admin_shows(shows, &movies, &paid))
    }

    /// Every booking, newest first, with the holder's display name.
    pub async fn all_bookings(&self) -> CoreResult<Vec<AdminBooking>> {
        let bookings = self.ledger.list_all().await?;

        let mut user_ids: Vec<String> = bookings.iter().map(|b| b.holder_id.clone()).collect();
        user_ids.sort();
        user_ids.dedup();
        let names: HashMap<String, String> = self
            .users
            .get_many(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let mut titles: HashMap<ShowId, String> = HashMap::new();
        for show_id in bookings.iter().map(|b| b.show_id).collect::<BTreeSet<_>>() {
            if let Some(show) = self.shows.get_show(show_id).await? {
                if let Some(movie) = self.movies.get_movie(&show.movie_id).await? {
                    titles.insert(show_id, movie.title);
                }
            }
        }

        Ok(bookings
            .into_iter()
            .map(|booking| AdminBooking {
                user_name: names.get(&booking.holder_id).cloned(),
                movie_title: titles.get(&booking.show_id).cloned(),
                booking,
            })
            .collect())
    }

    async fn movies_for(&self, shows: &[Show]) -> CoreResult<HashMap<String, Movie>> {
        let mut ids: Vec<String> = shows.iter().map(|s| s.movie_id.clone()).collect();
        ids.sort();
        ids.dedup();
        Ok(self
            .movies
            .get_movies(&ids)
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect())
    }
}
