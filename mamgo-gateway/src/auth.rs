use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{DecodingKey, Validation};
use mamgo_core::models::{Actor, UserRole};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::handlers::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: UserRole,
    pub iat: usize,
    pub exp: usize,
}

/// Decodes a bearer token into a caller identity. Returns `None` for
/// anything malformed, expired, or carrying an unparsable subject.
pub fn decode_actor(key: &DecodingKey, token: &str) -> Option<Actor> {
    let data = jsonwebtoken::decode::<Claims>(token, key, &Validation::default()).ok()?;
    let user_id = data.claims.sub.parse().ok()?;
    Some(Actor::new(user_id, data.claims.role))
}

/// Extractor for role-gated REST operations: missing or invalid
/// credentials are a hard 401 here, unlike the socket handshake's
/// guest downgrade.
#[derive(Debug)]
pub struct AuthActor(pub Actor);

impl FromRequestParts<AppState> for AuthActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .ok_or(ApiError::AuthenticationRequired)?
            .to_str()
            .map_err(|_| ApiError::InvalidToken)?;
        let token = header.strip_prefix("Bearer ").ok_or(ApiError::InvalidToken)?;

        decode_actor(&state.decoding_key, token)
            .map(AuthActor)
            .ok_or(ApiError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header};
    use uuid::Uuid;

    use super::*;

    const SECRET: &[u8] = b"gateway-test-secret";

    fn token(sub: String, role: UserRole, exp_offset: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub,
            role,
            iat: now as usize,
            exp: (now + exp_offset) as usize,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_decodes_to_actor() {
        let user_id = Uuid::new_v4();
        let key = DecodingKey::from_secret(SECRET);
        let actor = decode_actor(&key, &token(user_id.to_string(), UserRole::Courier, 3600));
        assert_eq!(actor, Some(Actor::new(user_id, UserRole::Courier)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let key = DecodingKey::from_secret(SECRET);
        let stale = token(Uuid::new_v4().to_string(), UserRole::Customer, -3600);
        assert_eq!(decode_actor(&key, &stale), None);
    }

    #[test]
    fn garbage_and_wrong_key_tokens_are_rejected() {
        let key = DecodingKey::from_secret(SECRET);
        assert_eq!(decode_actor(&key, "not-a-jwt"), None);

        let other = DecodingKey::from_secret(b"some-other-secret");
        assert_eq!(
            decode_actor(&other, &token(Uuid::new_v4().to_string(), UserRole::Admin, 3600)),
            None
        );
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let key = DecodingKey::from_secret(SECRET);
        assert_eq!(
            decode_actor(&key, &token("bob".to_string(), UserRole::Customer, 3600)),
            None
        );
    }
}
