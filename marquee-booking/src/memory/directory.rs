use async_trait::async_trait;
use marquee_core::catalog::Movie;
use marquee_core::identity::UserProfile;
use marquee_core::repository::{MovieStore, UserDirectory};
use marquee_core::{BookingError, CoreResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
pub struct InMemoryMovieStore {
    movies: RwLock<HashMap<String, Movie>>,
}

impl InMemoryMovieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MovieStore for InMemoryMovieStore {
    async fn get_movie(&self, id: &str) -> CoreResult<Option<Movie>> {
        Ok(self.movies.read().get(id).cloned())
    }

    async fn save_movie(&self, movie: &Movie) -> CoreResult<()> {
        self.movies.write().insert(movie.id.clone(), movie.clone());
        Ok(())
    }

    async fn get_movies(&self, ids: &[String]) -> CoreResult<Vec<Movie>> {
        let movies = self.movies.read();
        Ok(ids.iter().filter_map(|id| movies.get(id).cloned()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<BTreeMap<String, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn upsert(&self, user: &UserProfile) -> CoreResult<()> {
        self.users.write().insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> CoreResult<()> {
        self.users.write().remove(id);
        Ok(())
    }

    async fn get(&self, id: &str) -> CoreResult<Option<UserProfile>> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn get_many(&self, ids: &[String]) -> CoreResult<Vec<UserProfile>> {
        let users = self.users.read();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn list_all(&self) -> CoreResult<Vec<UserProfile>> {
        Ok(self.users.read().values().cloned().collect())
    }

    async fn count(&self) -> CoreResult<u64> {
        Ok(self.users.read().len() as u64)
    }

    async fn toggle_favorite(&self, user_id: &str, movie_id: &str) -> CoreResult<Vec<String>> {
        let mut users = self.users.write();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| BookingError::NotFound(format!("User {}", user_id)))?;

        if let Some(pos) = user.favorites.iter().position(|m| m == movie_id) {
            user.favorites.remove(pos);
        } else {
            user.favorites.push(movie_id.to_string());
        }
        Ok(user.favorites.clone())
    }
}
