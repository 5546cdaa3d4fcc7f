use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// JWT Claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Display name
    pub uid: i32,    // User ID
    #[serde(default)]
    pub admin: bool,
    pub exp: usize, // Expiration timestamp
}

/// Sign a token for a user. Tokens are normally issued by the account
/// service; this exists for tooling and tests sharing the same secret.
pub fn sign(secret: &str, user_id: i32, display_name: &str, admin: bool) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(7))
        .context("token expiry out of range")?
        .timestamp();

    let claims = Claims {
        sub: display_name.to_owned(),
        uid: user_id,
        admin,
        exp: expiration as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify and decode a JWT token.
pub fn verify(secret: &str, token: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
