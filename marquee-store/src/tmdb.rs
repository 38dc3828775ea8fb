use async_trait::async_trait;
use marquee_core::catalog::{CastMember, CatalogProvider, Genre, Movie, MovieSummary};
use marquee_core::{BookingError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::redis_repo::RedisClient;

const CACHE_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct MovieDetails {
    id: i64,
    title: String,
    #[serde(default)]
    overview: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
    original_language: Option<String>,
    tagline: Option<String>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    vote_average: f64,
    runtime: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    id: i64,
    title: String,
    #[serde(default)]
    overview: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
    #[serde(default)]
    vote_average: f64,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<ListEntry>,
}

fn into_movie(details: MovieDetails, credits: Credits) -> Movie {
    Movie {
        id: details.id.to_string(),
        title: details.title,
        overview: details.overview,
        poster_path: details.poster_path,
        backdrop_path: details.backdrop_path,
        release_date: details.release_date,
        original_language: details.original_language,
        tagline: details.tagline.filter(|t| !t.is_empty()),
        genres: details.genres,
        casts: credits.cast,
        vote_average: details.vote_average,
        runtime: details.runtime,
    }
}

impl From<ListEntry> for MovieSummary {
    fn from(entry: ListEntry) -> Self {
        MovieSummary {
            id: entry.id.to_string(),
            title: entry.title,
            overview: entry.overview,
            poster_path: entry.poster_path,
            backdrop_path: entry.backdrop_path,
            release_date: entry.release_date,
            vote_average: entry.vote_average,
        }
    }
}

/// TMDB v3 client. Responses are cached in Redis for an hour when a cache
/// is attached; cache failures fall through to the API.
#[derive(Clone)]
pub struct TmdbCatalog {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
    cache: Option<RedisClient>,
}

impl TmdbCatalog {
    pub fn new(access_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(12)).build()?;
        Ok(Self {
            http,
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: RedisClient) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn get_raw(&self, path: &str) -> CoreResult<String> {
        let cache_key = format!("tmdb:{}", path);
        if let Some(cache) = &self.cache {
            match cache.get_cached(&cache_key).await {
                Ok(Some(hit)) => {
                    debug!("TMDB cache hit for {}", path);
                    return Ok(hit);
                }
                Ok(None) => {}
                Err(e) => warn!("TMDB cache read failed for {}: {}", path, e),
            }
        }

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(BookingError::gateway)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BookingError::NotFound(format!("Catalog entry {}", path)));
        }
        let body = response
            .error_for_status()
            .map_err(BookingError::gateway)?
            .text()
            .await
            .map_err(BookingError::gateway)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set_cached(&cache_key, &body, CACHE_TTL_SECONDS).await {
                warn!("TMDB cache write failed for {}: {}", path, e);
            }
        }
        Ok(body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> CoreResult<T> {
        let body = self.get_raw(path).await?;
        serde_json::from_str(&body).map_err(|e| BookingError::gateway(format!("Unexpected TMDB response for {}: {}", path, e)))
    }
}

#[async_trait]
impl CatalogProvider for TmdbCatalog {
    async fn movie_details(&self, movie_id: &str) -> CoreResult<Movie> {
        if movie_id.is_empty() || !movie_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(BookingError::InvalidRequest(format!("Invalid movie id {:?}", movie_id)));
        }
        let details_path = format!("/movie/{}", movie_id);
        let credits_path = format!("/movie/{}/credits", movie_id);
        let (details, credits) = tokio::try_join!(
            self.get::<MovieDetails>(&details_path),
            self.get::<Credits>(&credits_path),
        )?;
        Ok(into_movie(details, credits))
    }

    async fn now_playing(&self) -> CoreResult<Vec<MovieSummary>> {
        let list: ListResponse = self.get("/movie/now_playing").await?;
        Ok(list.results.into_iter().map(MovieSummary::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_and_credits_merge_into_movie() {
        let details: MovieDetails = serde_json::from_str(
            r#"{"id":550,"title":"Fight Club","overview":"...","tagline":"","genres":[{"id":18,"name":"Drama"}],"vote_average":8.4,"runtime":139}"#,
        )
        .unwrap();
        let credits: Credits =
            serde_json::from_str(r#"{"cast":[{"name":"Edward Norton","profile_path":"/e.jpg","character":"Narrator"}]}"#).unwrap();

        let movie = into_movie(details, credits);
        assert_eq!(movie.id, "550");
        assert_eq!(movie.tagline, None);
        assert_eq!(movie.genres[0].name, "Drama");
        assert_eq!(movie.casts[0].name, "Edward Norton");
        assert_eq!(movie.runtime, Some(139));
    }

    #[tokio::test]
    async fn test_non_numeric_movie_id_rejected_before_any_request() {
        let catalog = TmdbCatalog::new("token", "http://127.0.0.1:1").unwrap();
        assert!(matches!(
            catalog.movie_details("../admin").await,
            Err(BookingError::InvalidRequest(_))
        ));
    }
}
