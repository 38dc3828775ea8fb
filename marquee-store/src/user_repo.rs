use async_trait::async_trait;
use marquee_core::identity::UserProfile;
use marquee_core::repository::UserDirectory;
use marquee_core::{BookingError, CoreResult};
use sqlx::PgPool;

use crate::error::StoreResult;

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    image: Option<String>,
    favorites: Vec<String>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        UserProfile {
            id: row.id,
            name: row.name,
            email: row.email,
            image: row.image,
            favorites: row.favorites,
        }
    }
}

impl PgUserDirectory {
    async fn save(&self, user: &UserProfile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, image, favorites)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, email = EXCLUDED.email, image = EXCLUDED.image,
                favorites = EXCLUDED.favorites, updated_at = NOW()
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.image)
        .bind(&user.favorites)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch(&self, ids: Option<&[String]>) -> StoreResult<Vec<UserProfile>> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, name, email, image, favorites FROM users WHERE $1::text[] IS NULL OR id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn total(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?)
    }

    async fn flip_favorite(&self, user_id: &str, movie_id: &str) -> StoreResult<Option<Vec<String>>> {
        let favorites: Option<Vec<String>> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET favorites = CASE WHEN $2 = ANY(favorites) THEN array_remove(favorites, $2)
                                 ELSE array_append(favorites, $2) END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING favorites
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(favorites)
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn upsert(&self, user: &UserProfile) -> CoreResult<()> {
        Ok(self.save(user).await?)
    }

    async fn delete(&self, id: &str) -> CoreResult<()> {
        Ok(self.remove(id).await?)
    }

    async fn get(&self, id: &str) -> CoreResult<Option<UserProfile>> {
        Ok(self.fetch(Some(&[id.to_string()])).await?.into_iter().next())
    }

    async fn get_many(&self, ids: &[String]) -> CoreResult<Vec<UserProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.fetch(Some(ids)).await?)
    }

    async fn list_all(&self) -> CoreResult<Vec<UserProfile>> {
        Ok(self.fetch(None).await?)
    }

    async fn count(&self) -> CoreResult<u64> {
        Ok(self.total().await?.max(0) as u64)
    }

    async fn toggle_favorite(&self, user_id: &str, movie_id: &str) -> CoreResult<Vec<String>> {
        self.flip_favorite(user_id, movie_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("User {}", user_id)))
    }
}
