use async_trait::async_trait;
use marquee_core::catalog::{CastMember, Genre, Movie};
use marquee_core::repository::MovieStore;
use marquee_core::CoreResult;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::StoreResult;

/// Movies copied from the catalog when a show is first scheduled for them.
/// Genres and cast are kept as JSONB since they are only ever read whole.
pub struct PgMovieStore {
    pool: PgPool,
}

impl PgMovieStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MovieRow {
    id: String,
    title: String,
    overview: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
    original_language: Option<String>,
    tagline: Option<String>,
    genres: Json<Vec<Genre>>,
    casts: Json<Vec<CastMember>>,
    vote_average: f64,
    runtime: Option<i32>,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie {
            id: row.id,
            title: row.title,
            overview: row.overview,
            poster_path: row.poster_path,
            backdrop_path: row.backdrop_path,
            release_date: row.release_date,
            original_language: row.original_language,
            tagline: row.tagline,
            genres: row.genres.0,
            casts: row.casts.0,
            vote_average: row.vote_average,
            runtime: row.runtime,
        }
    }
}

const MOVIE_COLUMNS: &str = "id, title, overview, poster_path, backdrop_path, release_date, original_language, \
                             tagline, genres, casts, vote_average, runtime";

impl PgMovieStore {
    async fn fetch(&self, ids: &[String]) -> StoreResult<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(&format!("SELECT {} FROM movies WHERE id = ANY($1)", MOVIE_COLUMNS))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn save(&self, movie: &Movie) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO movies (id, title, overview, poster_path, backdrop_path, release_date,
                                original_language, tagline, genres, casts, vote_average, runtime)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, overview = EXCLUDED.overview, poster_path = EXCLUDED.poster_path,
                backdrop_path = EXCLUDED.backdrop_path, release_date = EXCLUDED.release_date,
                original_language = EXCLUDED.original_language, tagline = EXCLUDED.tagline,
                genres = EXCLUDED.genres, casts = EXCLUDED.casts, vote_average = EXCLUDED.vote_average,
                runtime = EXCLUDED.runtime, updated_at = NOW()
            "#,
        )
        .bind(&movie.id)
        .bind(&movie.title)
        .bind(&movie.overview)
        .bind(&movie.poster_path)
        .bind(&movie.backdrop_path)
        .bind(&movie.release_date)
        .bind(&movie.original_language)
        .bind(&movie.tagline)
        .bind(Json(&movie.genres))
        .bind(Json(&movie.casts))
        .bind(movie.vote_average)
        .bind(movie.runtime)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MovieStore for PgMovieStore {
    async fn get_movie(&self, id: &str) -> CoreResult<Option<Movie>> {
        Ok(self.fetch(&[id.to_string()]).await?.into_iter().next())
    }

    async fn save_movie(&self, movie: &Movie) -> CoreResult<()> {
        Ok(self.save(movie).await?)
    }

    async fn get_movies(&self, ids: &[String]) -> CoreResult<Vec<Movie>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.fetch(ids).await?)
    }
}
