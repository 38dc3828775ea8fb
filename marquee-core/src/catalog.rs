use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CoreResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub profile_path: Option<String>,
}

/// Movie as stored locally once a show is scheduled for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub original_language: Option<String>,
    pub tagline: Option<String>,
    pub genres: Vec<Genre>,
    pub casts: Vec<CastMember>,
    pub vote_average: f64,
    pub runtime: Option<i32>,
}

/// Now-playing entry; no credits or runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: String,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: f64,
}

/// Read-only movie metadata provider.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Details and cast. `NotFound` when the provider has no such movie.
    async fn movie_details(&self, movie_id: &str) -> CoreResult<Movie>;

    async fn now_playing(&self) -> CoreResult<Vec<MovieSummary>>;
}
