use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::booking::{Booking, BookingId, BookingStatus, PaidTransition};
use marquee_core::repository::BookingLedger;
use marquee_core::show::{ReleaseSeats, ShowId};
use marquee_core::{BookingError, CoreResult};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::show_repo::{label_strings, parse_labels};

/// Booking ledger in Postgres. Every status change locks the row first
/// (`SELECT ... FOR UPDATE`) and then applies the transition table from
/// `BookingStatus`, so concurrent webhook and sweep deliveries serialize.
pub struct PgBookingLedger {
    pool: PgPool,
}

impl PgBookingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    holder_id: String,
    show_id: Uuid,
    seats: Vec<String>,
    amount_cents: i64,
    status: String,
    payment_reference: Option<String>,
    payment_link: Option<String>,
    hold_expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> StoreResult<Self> {
        Ok(Booking {
            id: row.id,
            holder_id: row.holder_id,
            show_id: row.show_id,
            seats: parse_labels(row.seats)?,
            amount_cents: row.amount_cents,
            status: row.status.parse()?,
            payment_reference: row.payment_reference,
            payment_link: row.payment_link,
            hold_expires_at: row.hold_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, holder_id, show_id, seats, amount_cents, status, payment_reference, \
                               payment_link, hold_expires_at, created_at, updated_at";

fn not_found(id: BookingId) -> StoreError {
    BookingError::NotFound(format!("Booking {}", id)).into()
}

fn into_bookings(rows: Vec<BookingRow>) -> StoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

impl PgBookingLedger {
    async fn lock(tx: &mut Transaction<'_, Postgres>, id: BookingId) -> StoreResult<Booking> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = $1 FOR UPDATE", BOOKING_COLUMNS))
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        row.ok_or_else(|| not_found(id))?.try_into()
    }

    async fn set_status(tx: &mut Transaction<'_, Postgres>, id: BookingId, status: BookingStatus) -> StoreResult<()> {
        // A paid booking no longer needs its checkout link.
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2,
                payment_link = CASE WHEN $2 = 'PAID' THEN NULL ELSE payment_link END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, holder_id, show_id, seats, amount_cents, status, payment_reference,
                                  payment_link, hold_expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.holder_id)
        .bind(booking.show_id)
        .bind(label_strings(&booking.seats))
        .bind(booking.amount_cents)
        .bind(booking.status.as_str())
        .bind(&booking.payment_reference)
        .bind(&booking.payment_link)
        .bind(booking.hold_expires_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn set_payment(&self, id: BookingId, reference: &str, link: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE bookings SET payment_reference = $2, payment_link = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(reference)
        .bind(link)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn paid(&self, id: BookingId) -> StoreResult<PaidTransition> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::lock(&mut tx, id).await?;

        let transition = booking.status.paid_transition()?;
        if transition == PaidTransition::Paid {
            Self::set_status(&mut tx, id, BookingStatus::Paid).await?;
        }
        tx.commit().await?;
        Ok(transition)
    }

    async fn expired(&self, id: BookingId) -> StoreResult<Option<ReleaseSeats>> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::lock(&mut tx, id).await?;

        if !booking.status.can_expire() {
            tx.rollback().await?;
            return Ok(None);
        }
        Self::set_status(&mut tx, id, BookingStatus::Expired).await?;
        tx.commit().await?;
        info!(booking_id = %id, "Booking expired");
        Ok(Some(booking.release_command()))
    }

    async fn query(&self, filter: &str, holder_id: Option<&str>, show_ids: Option<&[ShowId]>) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE {} ORDER BY created_at DESC",
            BOOKING_COLUMNS, filter
        ))
        .bind(holder_id)
        .bind(show_ids)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }
}

// Every listing binds the same two optional parameters so one query builder
// serves all of them.
const BY_HOLDER: &str = "holder_id = $1 AND $2::uuid[] IS NULL";
const ALL: &str = "$1::text IS NULL AND $2::uuid[] IS NULL";
const PAID: &str = "status = 'PAID' AND $1::text IS NULL AND $2::uuid[] IS NULL";
const PAID_FOR_SHOWS: &str = "status = 'PAID' AND $1::text IS NULL AND show_id = ANY($2)";

#[async_trait]
impl BookingLedger for PgBookingLedger {
    async fn create(&self, booking: &Booking) -> CoreResult<()> {
        Ok(self.insert(booking).await?)
    }

    async fn get(&self, id: BookingId) -> CoreResult<Option<Booking>> {
        Ok(self.find(id).await?)
    }

    async fn attach_payment(&self, id: BookingId, reference: &str, link: &str) -> CoreResult<()> {
        Ok(self.set_payment(id, reference, link).await?)
    }

    async fn mark_paid(&self, id: BookingId) -> CoreResult<PaidTransition> {
        Ok(self.paid(id).await?)
    }

    async fn mark_expired(&self, id: BookingId) -> CoreResult<Option<ReleaseSeats>> {
        Ok(self.expired(id).await?)
    }

    async fn list_for_holder(&self, holder_id: &str) -> CoreResult<Vec<Booking>> {
        Ok(self.query(BY_HOLDER, Some(holder_id), None).await?)
    }

    async fn list_all(&self) -> CoreResult<Vec<Booking>> {
        Ok(self.query(ALL, None, None).await?)
    }

    async fn list_paid(&self) -> CoreResult<Vec<Booking>> {
        Ok(self.query(PAID, None, None).await?)
    }

    async fn paid_for_shows(&self, show_ids: &[ShowId]) -> CoreResult<Vec<Booking>> {
        if show_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.query(PAID_FOR_SHOWS, None, Some(show_ids)).await?)
    }
}
