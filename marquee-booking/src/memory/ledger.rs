use async_trait::async_trait;
use chrono::Utc;
use marquee_core::booking::{Booking, BookingId, BookingStatus, PaidTransition};
use marquee_core::repository::BookingLedger;
use marquee_core::show::{ReleaseSeats, ShowId};
use marquee_core::{BookingError, CoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct InMemoryLedger {
    bookings: RwLock<HashMap<BookingId, Booking>>,
    fail_attach: AtomicBool,
    fail_expire: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_attach_payment(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mark_expired(&self, fail: bool) {
        self.fail_expire.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.bookings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.read().is_empty()
    }

    fn newest_first(&self, keep: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.bookings.read().values().filter(|b| keep(b)).cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }
}

fn not_found(id: BookingId) -> BookingError {
    BookingError::NotFound(format!("Booking {}", id))
}

#[async_trait]
impl BookingLedger for InMemoryLedger {
    async fn create(&self, booking: &Booking) -> CoreResult<()> {
        let mut bookings = self.bookings.write();
        if bookings.contains_key(&booking.id) {
            return Err(BookingError::Storage(format!("Duplicate booking {}", booking.id)));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: BookingId) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.read().get(&id).cloned())
    }

    async fn attach_payment(&self, id: BookingId, reference: &str, link: &str) -> CoreResult<()> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(BookingError::Storage("Injected attach failure".to_string()));
        }
        let mut bookings = self.bookings.write();
        let booking = bookings.get_mut(&id).ok_or_else(|| not_found(id))?;
        booking.payment_reference = Some(reference.to_string());
        booking.payment_link = Some(link.to_string());
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_paid(&self, id: BookingId) -> CoreResult<PaidTransition> {
        let mut bookings = self.bookings.write();
        let booking = bookings.get_mut(&id).ok_or_else(|| not_found(id))?;

        let transition = booking.status.paid_transition()?;
        if transition == PaidTransition::Paid {
            booking.status = BookingStatus::Paid;
            booking.payment_link = None;
            booking.updated_at = Utc::now();
        }
        Ok(transition)
    }

    async fn mark_expired(&self, id: BookingId) -> CoreResult<Option<ReleaseSeats>> {
        if self.fail_expire.load(Ordering::SeqCst) {
            return Err(BookingError::Storage("Injected expire failure".to_string()));
        }
        let mut bookings = self.bookings.write();
        let booking = bookings.get_mut(&id).ok_or_else(|| not_found(id))?;

        if !booking.status.can_expire() {
            return Ok(None);
        }
        booking.status = BookingStatus::Expired;
        booking.updated_at = Utc::now();
        Ok(Some(booking.release_command()))
    }

    async fn list_for_holder(&self, holder_id: &str) -> CoreResult<Vec<Booking>> {
        Ok(self.newest_first(|b| b.holder_id == holder_id))
    }

    async fn list_all(&self) -> CoreResult<Vec<Booking>> {
        Ok(self.newest_first(|_| true))
    }

    async fn list_paid(&self) -> CoreResult<Vec<Booking>> {
        Ok(self.newest_first(|b| b.status == BookingStatus::Paid))
    }

    async fn paid_for_shows(&self, show_ids: &[ShowId]) -> CoreResult<Vec<Booking>> {
        Ok(self.newest_first(|b| b.status == BookingStatus::Paid && show_ids.contains(&b.show_id)))
    }
}
