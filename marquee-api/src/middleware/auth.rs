use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use marquee_core::identity::{Caller, Role};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
}

impl Claims {
    fn caller(&self) -> Caller {
        let role = match self.role.as_deref() {
            Some("ADMIN") => Role::Admin,
            _ => Role::Customer,
        };
        Caller {
            user_id: self.sub.clone(),
            role,
        }
    }
}

/// Signs an HS256 token; the identity provider does this in production.
pub fn issue_token(secret: &str, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret.as_bytes()))
}

fn authenticate(state: &AppState, req: &Request) -> Result<Caller, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Not authenticated".to_string()))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AppError::AuthenticationError("Invalid token".to_string()))?;

    Ok(token_data.claims.caller())
}

/// Any signed-in user. Inserts the `Caller` into request extensions.
pub async fn user_auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let caller = authenticate(&state, &req)?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

pub async fn admin_auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let caller = authenticate(&state, &req)?;
    if !caller.is_admin() {
        tracing::warn!(user_id = %caller.user_id, "Admin route refused");
        return Err(AppError::AuthorizationError("Not authorized".to_string()));
    }
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
