use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::repository::{ShowInventory, ShowRepository};
use marquee_core::seat::SeatLabel;
use marquee_core::show::{HoldResult, NewShow, ReleaseSeats, SeatHolder, Show, ShowId};
use marquee_core::{BookingError, CoreResult};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

type SeatMap = BTreeMap<SeatLabel, SeatHolder>;

/// Shows and their seat maps. Each show's map sits behind its own mutex, so
/// holds on one show serialize while different shows proceed independently.
/// No lock is held across an await.
#[derive(Default)]
pub struct InMemoryShowStore {
    shows: RwLock<HashMap<ShowId, Show>>,
    seats: RwLock<HashMap<ShowId, Arc<Mutex<SeatMap>>>>,
    release_failures: AtomicU32,
}

impl InMemoryShowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_show(&self, show: Show) {
        self.seats.write().entry(show.id).or_default();
        self.shows.write().insert(show.id, show);
    }

    pub fn holder_of(&self, show_id: ShowId, label: &str) -> Option<SeatHolder> {
        let label: SeatLabel = label.parse().ok()?;
        let map = self.seats.read().get(&show_id).cloned()?;
        let seats = map.lock();
        seats.get(&label).cloned()
    }

    /// The next `count` releases fail with a storage error.
    pub fn fail_next_releases(&self, count: u32) {
        self.release_failures.store(count, Ordering::SeqCst);
    }

    fn seat_map(&self, show_id: ShowId) -> CoreResult<Arc<Mutex<SeatMap>>> {
        self.seats
            .read()
            .get(&show_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("Show {}", show_id)))
    }

    fn take_injected_failure(&self) -> bool {
        self.release_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ShowInventory for InMemoryShowStore {
    async fn try_hold_seats(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        holder: &SeatHolder,
    ) -> CoreResult<HoldResult> {
        let map = self.seat_map(show_id)?;
        let mut held = map.lock();

        let conflicts: Vec<SeatLabel> = seats.iter().filter(|s| held.contains_key(*s)).cloned().collect();
        if !conflicts.is_empty() {
            return Ok(HoldResult::Conflict(conflicts));
        }

        for seat in seats {
            held.insert(seat.clone(), holder.clone());
        }
        Ok(HoldResult::Held)
    }

    async fn release_seats(&self, release: &ReleaseSeats) -> CoreResult<()> {
        if self.take_injected_failure() {
            return Err(BookingError::Storage("Injected release failure".to_string()));
        }

        let Ok(map) = self.seat_map(release.show_id) else {
            return Ok(());
        };
        let mut held = map.lock();
        for seat in &release.seats {
            if held.get(seat).is_some_and(|h| h.booking_id == release.booking_id) {
                held.remove(seat);
            }
        }
        Ok(())
    }

    async fn list_occupied(&self, show_id: ShowId) -> CoreResult<BTreeSet<SeatLabel>> {
        let map = self.seat_map(show_id)?;
        let held = map.lock();
        Ok(held.keys().cloned().collect())
    }
}

#[async_trait]
impl ShowRepository for InMemoryShowStore {
    async fn create_shows(&self, shows: Vec<NewShow>) -> CoreResult<Vec<Show>> {
        let now = Utc::now();
        let created: Vec<Show> = shows.into_iter().map(|s| s.into_show(now)).collect();
        for show in &created {
            self.insert_show(show.clone());
        }
        Ok(created)
    }

    async fn get_show(&self, id: ShowId) -> CoreResult<Option<Show>> {
        Ok(self.shows.read().get(&id).cloned())
    }

    async fn list_upcoming(&self, from: DateTime<Utc>) -> CoreResult<Vec<Show>> {
        Ok(self.sorted(|s| s.starts_at >= from))
    }

    async fn list_upcoming_for_movie(&self, movie_id: &str, from: DateTime<Utc>) -> CoreResult<Vec<Show>> {
        Ok(self.sorted(|s| s.movie_id == movie_id && s.starts_at >= from))
    }

    async fn list_starting_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> CoreResult<Vec<Show>> {
        Ok(self.sorted(|s| s.starts_at >= from && s.starts_at <= to))
    }
}

impl InMemoryShowStore {
    fn sorted(&self, keep: impl Fn(&Show) -> bool) -> Vec<Show> {
        let mut shows: Vec<Show> = self.shows.read().values().filter(|s| keep(s)).cloned().collect();
        shows.sort_by_key(|s| s.starts_at);
        shows
    }
}
