use marquee_booking::{DispatchOutcome, NotificationOutcome, SweepOutcome};
use marquee_core::CoreResult;
use prometheus::{opts, Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};

/// Counters for the booking lifecycle and the job worker, scraped at `/metrics`.
pub struct Metrics {
    registry: Registry,
    pub reservations: IntCounter,
    pub seat_conflicts: IntCounter,
    pub bookings_paid: IntCounter,
    pub bookings_expired: IntCounter,
    pub late_payments: IntCounter,
    /// Labels: `job`, `status` (ok, failed)
    pub jobs: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reservations = IntCounter::with_opts(opts!("marquee_reservations_total", "Bookings created with seats held"))?;
        let seat_conflicts = IntCounter::with_opts(opts!(
            "marquee_seat_conflicts_total",
            "Reservations rejected because a seat was taken"
        ))?;
        let bookings_paid = IntCounter::with_opts(opts!("marquee_bookings_paid_total", "Bookings marked paid"))?;
        let bookings_expired = IntCounter::with_opts(opts!(
            "marquee_bookings_expired_total",
            "Bookings expired by the sweeper"
        ))?;
        let late_payments = IntCounter::with_opts(opts!(
            "marquee_late_payments_total",
            "Payments received for already expired bookings"
        ))?;
        let jobs = IntCounterVec::new(
            opts!("marquee_jobs_processed_total", "Background jobs processed"),
            &["job", "status"],
        )?;

        registry.register(Box::new(reservations.clone()))?;
        registry.register(Box::new(seat_conflicts.clone()))?;
        registry.register(Box::new(bookings_paid.clone()))?;
        registry.register(Box::new(bookings_expired.clone()))?;
        registry.register(Box::new(late_payments.clone()))?;
        registry.register(Box::new(jobs.clone()))?;

        Ok(Self {
            registry,
            reservations,
            seat_conflicts,
            bookings_paid,
            bookings_expired,
            late_payments,
            jobs,
        })
    }

    pub fn observe_notification(&self, outcome: &NotificationOutcome) {
        match outcome {
            NotificationOutcome::Paid(_) => self.bookings_paid.inc(),
            NotificationOutcome::LatePayment(_) => self.late_payments.inc(),
            _ => {}
        }
    }

    pub fn observe_job(&self, job_name: &str, result: &CoreResult<DispatchOutcome>) {
        let status = if result.is_ok() { "ok" } else { "failed" };
        self.jobs.with_label_values(&[job_name, status]).inc();
        if let Ok(DispatchOutcome::Swept(SweepOutcome::Expired(_))) = result {
            self.bookings_expired.inc();
        }
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::show::ReleaseSeats;
    use marquee_core::BookingError;
    use uuid::Uuid;

    #[test]
    fn test_expired_sweeps_and_failures_are_counted() {
        let metrics = Metrics::new().unwrap();
        let release = ReleaseSeats {
            show_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            seats: vec![],
        };

        metrics.observe_job("booking/check-payment", &Ok(DispatchOutcome::Swept(SweepOutcome::Expired(release))));
        metrics.observe_job("booking/check-payment", &Err(BookingError::Storage("down".into())));

        assert_eq!(metrics.bookings_expired.get(), 1);
        assert_eq!(metrics.jobs.with_label_values(&["booking/check-payment", "failed"]).get(), 1);

        let text = metrics.render();
        assert!(text.contains("marquee_bookings_expired_total 1"));
    }
}
