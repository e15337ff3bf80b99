//! Bearer-token authentication.
//!
//! Tokens are HMAC-signed JWTs carrying the user id, email and role. The
//! [`CurrentUser`] extractor verifies the token and re-checks the user row
//! on every request, so a deactivated account is locked out immediately even
//! while its token is still formally valid. Login/registration live in the
//! layer above; [`issue_token`] is the seam it (and the tests) use.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::http::AppState;
use crate::models::{AuthUser, Role};
use crate::repositories::users;

/// Claims carried by a signed bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a token for `user`, valid for `expires_in` seconds.
pub fn issue_token(
    secret: &str,
    user: &AuthUser,
    expires_in: i64,
) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        iat: now,
        exp: now + expires_in,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verifies signature and expiry; anything wrong yields `None`.
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Authenticated principal for a request.
///
/// Rejections short-circuit before any business logic runs: missing token
/// 401, invalid/expired token 401, vanished user 404, deactivated user 403.
pub struct CurrentUser(pub AuthUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Token de autenticación requerido".into()))?;
        let claims = verify_token(&state.config.jwt_secret, token)
            .ok_or_else(|| AppError::Unauthorized("Token inválido o expirado".into()))?;

        let user = users::find_auth_user(&state.pool, claims.sub)
            .await?
            .ok_or_else(|| AppError::NotFound("Usuario no encontrado".into()))?;
        if !user.activo {
            return Err(AppError::Forbidden("Usuario desactivado".into()));
        }
        Ok(CurrentUser(user))
    }
}
