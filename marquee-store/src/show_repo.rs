use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::repository::{ShowInventory, ShowRepository};
use marquee_core::seat::SeatLabel;
use marquee_core::show::{HoldResult, NewShow, ReleaseSeats, SeatHolder, Show, ShowId};
use marquee_core::{BookingError, CoreResult};
use sqlx::PgPool;
use std::collections::BTreeSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Shows and their seat maps in Postgres. A held seat is a row in
/// `show_seats`; its primary key makes a double hold impossible.
pub struct PgShowStore {
    pool: PgPool,
}

impl PgShowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShowRow {
    id: Uuid,
    movie_id: String,
    starts_at: DateTime<Utc>,
    price_cents: i64,
    created_at: DateTime<Utc>,
}

impl From<ShowRow> for Show {
    fn from(row: ShowRow) -> Self {
        Show {
            id: row.id,
            movie_id: row.movie_id,
            starts_at: row.starts_at,
            price_cents: row.price_cents,
            created_at: row.created_at,
        }
    }
}

pub(crate) fn parse_labels(raw: Vec<String>) -> StoreResult<Vec<SeatLabel>> {
    raw.into_iter()
        .map(|label| {
            label
                .parse::<SeatLabel>()
                .map_err(|_| StoreError::Corrupt(format!("seat label {:?}", label)))
        })
        .collect()
}

pub(crate) fn label_strings(labels: &[SeatLabel]) -> Vec<String> {
    labels.iter().map(|l| l.as_str().to_string()).collect()
}

const SHOW_COLUMNS: &str = "id, movie_id, starts_at, price_cents, created_at";

impl PgShowStore {
    async fn hold(&self, show_id: ShowId, seats: &[SeatLabel], holder: &SeatHolder) -> StoreResult<HoldResult> {
        // Sorted so concurrent holds on overlapping seats lock rows in the same order.
        let mut requested = label_strings(seats);
        requested.sort();
        requested.dedup();

        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM shows WHERE id = $1 FOR SHARE")
            .bind(show_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(BookingError::NotFound(format!("Show {}", show_id)).into());
        }

        let inserted: Vec<String> = sqlx::query_scalar(
            r#"
            INSERT INTO show_seats (show_id, seat_label, holder_id, booking_id)
            SELECT $1, label, $3, $4 FROM UNNEST($2::text[]) AS label
            ON CONFLICT (show_id, seat_label) DO NOTHING
            RETURNING seat_label
            "#,
        )
        .bind(show_id)
        .bind(&requested)
        .bind(&holder.holder_id)
        .bind(holder.booking_id)
        .fetch_all(&mut *tx)
        .await?;

        if inserted.len() == requested.len() {
            tx.commit().await?;
            info!(show_id = %show_id, booking_id = %holder.booking_id, "Held {} seats", inserted.len());
            return Ok(HoldResult::Held);
        }

        tx.rollback().await?;
        let taken: Vec<String> = requested.into_iter().filter(|l| !inserted.contains(l)).collect();
        debug!(show_id = %show_id, "Hold rejected, taken: {:?}", taken);
        Ok(HoldResult::Conflict(parse_labels(taken)?))
    }

    async fn release(&self, release: &ReleaseSeats) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM show_seats WHERE show_id = $1 AND booking_id = $2 AND seat_label = ANY($3)",
        )
        .bind(release.show_id)
        .bind(release.booking_id)
        .bind(label_strings(&release.seats))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn occupied(&self, show_id: ShowId) -> StoreResult<BTreeSet<SeatLabel>> {
        if self.find(show_id).await?.is_none() {
            return Err(BookingError::NotFound(format!("Show {}", show_id)).into());
        }

        let labels: Vec<String> = sqlx::query_scalar("SELECT seat_label FROM show_seats WHERE show_id = $1")
            .bind(show_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(parse_labels(labels)?.into_iter().collect())
    }

    async fn insert_shows(&self, shows: Vec<NewShow>) -> StoreResult<Vec<Show>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(shows.len());

        for new_show in shows {
            let show = new_show.into_show(now);
            sqlx::query(
                "INSERT INTO shows (id, movie_id, starts_at, price_cents, created_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(show.id)
            .bind(&show.movie_id)
            .bind(show.starts_at)
            .bind(show.price_cents)
            .bind(show.created_at)
            .execute(&mut *tx)
            .await?;
            created.push(show);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn find(&self, id: ShowId) -> StoreResult<Option<Show>> {
        let row: Option<ShowRow> = sqlx::query_as(&format!("SELECT {} FROM shows WHERE id = $1", SHOW_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Show::from))
    }

    async fn between(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>, movie_id: Option<&str>) -> StoreResult<Vec<Show>> {
        let rows: Vec<ShowRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM shows
            WHERE starts_at >= $1
              AND ($2::timestamptz IS NULL OR starts_at <= $2)
              AND ($3::text IS NULL OR movie_id = $3)
            ORDER BY starts_at ASC
            "#,
            SHOW_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Show::from).collect())
    }
}

#[async_trait]
impl ShowInventory for PgShowStore {
    async fn try_hold_seats(&self, show_id: ShowId, seats: &[SeatLabel], holder: &SeatHolder) -> CoreResult<HoldResult> {
        Ok(self.hold(show_id, seats, holder).await?)
    }

    async fn release_seats(&self, release: &ReleaseSeats) -> CoreResult<()> {
        let freed = self.release(release).await?;
        info!(show_id = %release.show_id, booking_id = %release.booking_id, "Released {} seats", freed);
        Ok(())
    }

    async fn list_occupied(&self, show_id: ShowId) -> CoreResult<BTreeSet<SeatLabel>> {
        Ok(self.occupied(show_id).await?)
    }
}

#[async_trait]
impl ShowRepository for PgShowStore {
    async fn create_shows(&self, shows: Vec<NewShow>) -> CoreResult<Vec<Show>> {
        Ok(self.insert_shows(shows).await?)
    }

    async fn get_show(&self, id: ShowId) -> CoreResult<Option<Show>> {
        Ok(self.find(id).await?)
    }

    async fn list_upcoming(&self, from: DateTime<Utc>) -> CoreResult<Vec<Show>> {
        Ok(self.between(from, None, None).await?)
    }

    async fn list_upcoming_for_movie(&self, movie_id: &str, from: DateTime<Utc>) -> CoreResult<Vec<Show>> {
        Ok(self.between(from, None, Some(movie_id)).await?)
    }

    async fn list_starting_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> CoreResult<Vec<Show>> {
        Ok(self.between(from, Some(to), None).await?)
    }
}
