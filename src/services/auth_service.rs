use axum::http;
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use moka::sync::Cache;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("Missing Authorization header, auth_token cookie or token parameter")]
    MissingToken,
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    #[error("JWT validation failed: {0}")]
    InvalidToken(String),
    #[error("Token does not carry a user id")]
    MissingUserId,
    #[error("No JWT secret configured")]
    NoSecret,
}

fn token_from_query(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "token")
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

// Get the auth token from a request
pub fn get_auth_token<B>(req: &http::Request<B>) -> Result<String, AuthError> {
    token_from_parts(req.headers(), req.uri())
}

pub fn token_from_parts(headers: &http::HeaderMap, uri: &http::Uri) -> Result<String, AuthError> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = headers.get(http::header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidHeader("Authorization".to_string()))?;
        return Ok(auth_str.strip_prefix("Bearer ").unwrap_or(auth_str).to_string());
    }

    // 2. Try to get token from cookies
    if let Some(cookie_header) = headers.get(http::header::COOKIE) {
        let cookie_str = cookie_header
            .to_str()
            .map_err(|_| AuthError::InvalidHeader("Cookie".to_string()))?;
        for cookie in cookie::Cookie::split_parse(cookie_str).flatten() {
            if cookie.name() == "auth_token" {
                return Ok(cookie.value().to_string());
            }
        }
    }

    // 3. Browsers cannot set headers on a websocket handshake, so accept ?token=
    token_from_query(uri.query()).ok_or(AuthError::MissingToken)
}

// Validate a JWT token and return the token data
pub fn validate_jwt(token: &str, secret: &str) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

#[derive(Debug, Clone)]
struct VerifiedToken {
    user_id: String,
    exp: i64,
}

/// Turns bearer tokens into verified user ids, caching recent results
pub struct TokenVerifier {
    secret: Option<String>,
    cache: Cache<String, VerifiedToken>,
}

impl TokenVerifier {
    pub fn new(secret: Option<String>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(ttl)
            .build();
        info!("Token cache initialized");
        Self { secret, cache }
    }

    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        if let Some(cached) = self.cache.get(token) {
            if cached.exp > Utc::now().timestamp() {
                return Ok(cached.user_id);
            }
            // Expired inside the cache window, let validation report it
            self.cache.invalidate(token);
        }

        let secret = self.secret.as_deref().ok_or(AuthError::NoSecret)?;
        let token_data = validate_jwt(token, secret).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        // `user_id` is the issuer's claim, `sub` the standard fallback
        let uid = token_data
            .claims
            .get("user_id")
            .or_else(|| token_data.claims.get("sub"))
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingUserId)?
            .to_string();

        let exp = token_data.claims.get("exp").and_then(|v| v.as_i64()).unwrap_or(0);

        debug!("JWT token validated for user: {}", uid);
        self.cache.insert(token.to_string(), VerifiedToken { user_id: uid.clone(), exp });
        Ok(uid)
    }

    pub fn verify_request<B>(&self, req: &http::Request<B>) -> Result<String, AuthError> {
        let token = get_auth_token(req)?;
        self.verify(&token)
    }
}


#[cfg(test)]
mod tests {
    use super::test_tokens::{token_for, SECRET};
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(Some(SECRET.to_string()), Duration::from_secs(60))
    }

    #[test]
    fn test_verify_reads_user_id_claim() {
        assert_eq!(verifier().verify(&token_for("alice")).unwrap(), "alice");
    }

    #[test]
    fn test_verify_falls_back_to_sub() {
        let claims = json!({ "sub": "bob", "exp": Utc::now().timestamp() + 60 });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert_eq!(verifier().verify(&token).unwrap(), "bob");
    }

    #[test]
    fn test_verify_rejects_bad_tokens() {
        assert!(matches!(verifier().verify("garbage"), Err(AuthError::InvalidToken(_))));

        let other = TokenVerifier::new(Some("other".to_string()), Duration::from_secs(60));
        assert!(matches!(other.verify(&token_for("alice")), Err(AuthError::InvalidToken(_))));

        let none = TokenVerifier::new(None, Duration::from_secs(60));
        assert_eq!(none.verify(&token_for("alice")), Err(AuthError::NoSecret));
    }

    #[test]
    fn test_cached_token_expires_with_its_claim() {
        let verifier = verifier();
        let claims = json!({ "user_id": "alice", "exp": Utc::now().timestamp() + 1 });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert_eq!(verifier.verify(&token).unwrap(), "alice");

        std::thread::sleep(Duration::from_millis(2100));
        assert!(matches!(verifier.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_token_sources() {
        let req = http::Request::builder()
            .uri("/ws")
            .header(http::header::AUTHORIZATION, "Bearer abc")
            .body(())
            .unwrap();
        assert_eq!(get_auth_token(&req).unwrap(), "abc");

        let req = http::Request::builder()
            .uri("/ws")
            .header(http::header::COOKIE, "theme=dark; auth_token=xyz")
            .body(())
            .unwrap();
        assert_eq!(get_auth_token(&req).unwrap(), "xyz");

        let req = http::Request::builder().uri("/ws?room=1&token=q1").body(()).unwrap();
        assert_eq!(get_auth_token(&req).unwrap(), "q1");

        let req = http::Request::builder().uri("/ws").body(()).unwrap();
        assert_eq!(get_auth_token(&req), Err(AuthError::MissingToken));
    }
}
