use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AuthConfig;

/// Claims carried by the bearer tokens the identity collaborator issues.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Validate the bearer token and return the authenticated user id. Token
/// issuance lives with the identity collaborator; this only verifies.
pub fn authenticate(auth: &AuthConfig, token: &str) -> Result<Uuid, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ApiError::AuthenticationError(e.to_string()))?;

    Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| ApiError::AuthenticationError("malformed subject claim".to_string()))
}
