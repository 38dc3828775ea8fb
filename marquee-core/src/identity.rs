use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
}

/// Verified caller of an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    #[serde(default)]
    pub favorites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

/// User record as delivered by the identity provider's webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedUser {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UserEvent {
    #[serde(rename = "user.created")]
    Created(IdentityUser),
    #[serde(rename = "user.updated")]
    Updated(IdentityUser),
    #[serde(rename = "user.deleted")]
    Deleted(DeletedUser),
}

impl UserProfile {
    /// `None` when the provider gave no email address.
    pub fn from_identity(user: &IdentityUser) -> Option<Self> {
        let email = user.email_addresses.first()?.email_address.trim().to_string();
        if email.is_empty() {
            return None;
        }

        let name = format!(
            "{} {}",
            user.first_name.as_deref().unwrap_or_default(),
            user.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string();

        Some(Self {
            id: user.id.clone(),
            name,
            email,
            image: user.image_url.clone(),
            favorites: Vec::new(),
        })
    }
}
