use marquee_core::identity::{UserEvent, UserProfile};
use marquee_core::repository::UserDirectory;
use marquee_core::CoreResult;
use marquee_shared::Masked;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Upserted(String),
    Deleted(String),
    /// The provider record had no usable email.
    Skipped(String),
}

/// Mirrors identity provider user lifecycle events into the local directory.
pub struct UserSync {
    users: Arc<dyn UserDirectory>,
}

impl UserSync {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    pub async fn apply(&self, event: &UserEvent) -> CoreResult<SyncOutcome> {
        match event {
            UserEvent::Created(user) | UserEvent::Updated(user) => {
                let Some(mut profile) = UserProfile::from_identity(user) else {
                    tracing::warn!(user_id = %user.id, "Skipping user without email address");
                    return Ok(SyncOutcome::Skipped(user.id.clone()));
                };

                // Favorites are local data; the provider never sends them.
                if let Some(existing) = self.users.get(&profile.id).await? {
                    profile.favorites = existing.favorites;
                }

                self.users.upsert(&profile).await?;
                tracing::info!(user_id = %profile.id, email = %Masked(&profile.email), "User synced");
                Ok(SyncOutcome::Upserted(profile.id))
            }
            UserEvent::Deleted(deleted) => {
                self.users.delete(&deleted.id).await?;
                tracing::info!(user_id = %deleted.id, "User deleted");
                Ok(SyncOutcome::Deleted(deleted.id.clone()))
            }
        }
    }
}
