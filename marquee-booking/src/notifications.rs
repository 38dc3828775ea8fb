use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use marquee_core::booking::{BookingId, BookingStatus};
use marquee_core::notify::{Email, Mailer};
use marquee_core::repository::{BookingLedger, MovieStore, ShowRepository, UserDirectory};
use marquee_core::show::Show;
use marquee_core::CoreResult;
use marquee_shared::Masked;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    /// How far ahead of the show the reminder goes out.
    pub lead: Duration,
    /// Width of the window ending at `now + lead`. Only shows starting inside
    /// it at the moment a reminder run fires get an email; with the 8 h cron
    /// most shows fall between runs and are not reminded.
    pub width: Duration,
}

impl ReminderWindow {
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = now + self.lead;
        (end - self.width, end)
    }
}

impl Default for ReminderWindow {
    fn default() -> Self {
        Self {
            lead: Duration::hours(8),
            width: Duration::minutes(10),
        }
    }
}

/// Customer email for booking confirmations, show reminders and
/// new-show announcements.
pub struct Notifier {
    ledger: Arc<dyn BookingLedger>,
    shows: Arc<dyn ShowRepository>,
    movies: Arc<dyn MovieStore>,
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    timezone: Tz,
    reminders: ReminderWindow,
}

impl Notifier {
    pub fn new(
        ledger: Arc<dyn BookingLedger>,
        shows: Arc<dyn ShowRepository>,
        movies: Arc<dyn MovieStore>,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        timezone: Tz,
        reminders: ReminderWindow,
    ) -> Self {
        Self {
            ledger,
            shows,
            movies,
            users,
            mailer,
            timezone,
            reminders,
        }
    }

    /// Returns `false` when there is nothing to confirm (unknown or unpaid
    /// booking, holder without a profile). Mail errors propagate so the job is
    /// retried.
    pub async fn send_booking_confirmation(&self, booking_id: BookingId) -> CoreResult<bool> {
        let Some(booking) = self.ledger.get(booking_id).await? else {
            tracing::warn!(booking_id = %booking_id, "Confirmation requested for unknown booking");
            return Ok(false);
        };
        if booking.status != BookingStatus::Paid {
            tracing::warn!(booking_id = %booking_id, "Not confirming {} booking", booking.status);
            return Ok(false);
        }
        let Some(show) = self.shows.get_show(booking.show_id).await? else {
            return Ok(false);
        };
        let Some(user) = self.users.get(&booking.holder_id).await? else {
            tracing::warn!(booking_id = %booking_id, "Holder {} has no profile", booking.holder_id);
            return Ok(false);
        };
        let title = self.title_of(&show).await?;

        let seats = booking.seats.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
        let email = Email {
            to: user.email.clone(),
            subject: format!("Payment Confirmation: \"{}\" booked!", title),
            html: format!(
                "<div>\
                 <h2>Hi {name},</h2>\
                 <p>Your booking for <strong>{title}</strong> is confirmed.</p>\
                 <p><strong>Date:</strong> {when}</p>\
                 <p><strong>Seats:</strong> {seats}</p>\
                 <p>Enjoy the show!</p>\
                 </div>",
                name = escape_html(&user.name),
                title = escape_html(&title),
                when = self.local_time(show.starts_at),
                seats = seats,
            ),
        };

        self.mailer.send(&email).await?;
        tracing::info!(booking_id = %booking_id, to = %Masked(&user.email), "Booking confirmation sent");
        Ok(true)
    }

    /// Reminds every paying holder of shows starting inside the reminder window.
    pub async fn send_show_reminders(&self, now: DateTime<Utc>) -> CoreResult<DeliveryReport> {
        let (from, to) = self.reminders.bounds(now);
        let shows = self.shows.list_starting_between(from, to).await?;
        if shows.is_empty() {
            return Ok(DeliveryReport::default());
        }

        let show_ids: Vec<_> = shows.iter().map(|s| s.id).collect();
        let paid = self.ledger.paid_for_shows(&show_ids).await?;

        let mut holders_by_show: HashMap<_, BTreeSet<String>> = HashMap::new();
        for booking in paid {
            holders_by_show.entry(booking.show_id).or_default().insert(booking.holder_id);
        }

        let mut report = DeliveryReport::default();
        for show in &shows {
            let Some(holders) = holders_by_show.get(&show.id) else {
                continue;
            };
            let title = self.title_of(show).await?;
            let ids: Vec<String> = holders.iter().cloned().collect();

            for user in self.users.get_many(&ids).await? {
                let email = Email {
                    to: user.email.clone(),
                    subject: format!("Reminder: \"{}\" starts soon", title),
                    html: format!(
                        "<div>\
                         <h2>Hello {name},</h2>\
                         <p>Your movie <strong>{title}</strong> starts soon.</p>\
                         <p>{when}</p>\
                         </div>",
                        name = escape_html(&user.name),
                        title = escape_html(&title),
                        when = self.local_time(show.starts_at),
                    ),
                };
                self.deliver(&email, &mut report).await;
            }
        }

        tracing::info!(sent = report.sent, failed = report.failed, "Show reminders processed");
        Ok(report)
    }

    pub async fn announce_show(&self, movie_title: &str) -> CoreResult<DeliveryReport> {
        let users = self.users.list_all().await?;
        let mut report = DeliveryReport::default();

        for user in users {
            let email = Email {
                to: user.email.clone(),
                subject: format!("New Show Added: {}", movie_title),
                html: format!(
                    "<div>\
                     <h2>Hello {name},</h2>\
                     <p>A new show titled <strong>{title}</strong> is now available.</p>\
                     </div>",
                    name = escape_html(&user.name),
                    title = escape_html(movie_title),
                ),
            };
            self.deliver(&email, &mut report).await;
        }

        tracing::info!(sent = report.sent, failed = report.failed, "Announced {}", movie_title);
        Ok(report)
    }

    async fn deliver(&self, email: &Email, report: &mut DeliveryReport) {
        match self.mailer.send(email).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(to = %Masked(&email.to), "Email delivery failed: {}", e);
            }
        }
    }

    async fn title_of(&self, show: &Show) -> CoreResult<String> {
        Ok(self
            .movies
            .get_movie(&show.movie_id)
            .await?
            .map(|m| m.title)
            .unwrap_or_else(|| "your movie".to_string()))
    }

    fn local_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format("%a, %-d %b %Y, %-I:%M %p %Z")
            .to_string()
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
