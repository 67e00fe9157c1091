//! Stateless bearer tokens: HS256 JSON Web Tokens carrying the user id in
//! `sub`. Nothing is stored server side; a token is valid while its signature
//! checks out and `exp` lies in the future.

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_TOKEN_EXPIRATION_HOURS;
use crate::core::errors::{ApiError, ApiResult};

const MAX_TOKEN_LEN: usize = 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_hours", &self.ttl.num_hours())
            .finish_non_exhaustive()
    }
}

/// Lifetime for `ttl_hours`, falling back to the default when the value is
/// not positive or too large to represent.
fn token_ttl(ttl_hours: i64) -> Duration {
    Some(ttl_hours)
        .filter(|h| *h > 0)
        .and_then(Duration::try_hours)
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .unwrap_or_else(|| Duration::hours(DEFAULT_TOKEN_EXPIRATION_HOURS))
}

impl TokenIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl_hours: i64) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: token_ttl(ttl_hours),
        }
    }

    pub fn issue(&self, user_id: &str) -> ApiResult<String> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> ApiResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(anyhow!("failed to sign token: {}", e)))
    }

    /// Returns the user id the token was issued for.
    pub fn verify(&self, token: &str) -> ApiResult<String> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(ApiError::invalid_token());
        }
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| ApiError::invalid_token())?;

        if data.claims.sub.is_empty() {
            return Err(ApiError::invalid_token());
        }
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"unit-test-secret", 24 * 7)
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let tokens = issuer();
        let token = tokens.issue("user-1").unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "user-1");
    }

    #[test]
    fn token_expires_after_seven_days() {
        let tokens = issuer();

        let six_days_old = tokens.issue_at("user-1", Utc::now() - Duration::days(6)).unwrap();
        assert!(tokens.verify(&six_days_old).is_ok());

        let expired = tokens
            .issue_at("user-1", Utc::now() - Duration::days(7) - Duration::minutes(1))
            .unwrap();
        let err = tokens.verify(&expired).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = TokenIssuer::new(b"other", 1).issue("user-1").unwrap();
        assert!(matches!(
            issuer().verify(&token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let tokens = issuer();
        let genuine = tokens.issue("user-1").unwrap();
        let forged_source = TokenIssuer::new(b"attacker", 24).issue("admin").unwrap();

        let (_, genuine_sig) = genuine.rsplit_once('.').unwrap();
        let (forged_body, _) = forged_source.rsplit_once('.').unwrap();
        let forged = format!("{}.{}", forged_body, genuine_sig);

        assert!(tokens.verify(&forged).is_err());
    }

    #[test]
    fn garbage_is_rejected_with_invalid_token_message() {
        let tokens = issuer();
        for bad in ["", "abc", "a.b", "a.b.c", "..", "not-base64!.also-not!.x"] {
            let err = tokens.verify(bad).unwrap_err();
            assert_eq!(err.to_string(), "Invalid token", "input {:?}", bad);
        }
        let oversized = "a".repeat(MAX_TOKEN_LEN + 1);
        assert!(tokens.verify(&oversized).is_err());
    }

    #[test]
    fn huge_or_non_positive_lifetime_falls_back_to_default() {
        let default_ttl = Duration::hours(DEFAULT_TOKEN_EXPIRATION_HOURS);
        assert_eq!(token_ttl(i64::MAX), default_ttl);
        assert_eq!(token_ttl(0), default_ttl);
        assert_eq!(token_ttl(-5), default_ttl);
        assert_eq!(token_ttl(2), Duration::hours(2));

        let tokens = TokenIssuer::new(b"s", i64::MAX);
        let token = tokens.issue("user-1").unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "user-1");
    }

    #[test]
    fn debug_does_not_print_secret() {
        let rendered = format!("{:?}", issuer());
        assert!(!rendered.contains("unit-test-secret"));
    }
}
