use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

/// A freshly signed token and its absolute expiry (unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

/// Issues and verifies HS256 bearer tokens bound to a username.
///
/// Tokens are stateless: nothing is stored server-side and there is no
/// revocation, so a token stays valid until its `exp` passes.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], default_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // No grace period: a token is rejected from the first second after `exp`.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Signs a token for `subject` that expires `ttl` from now.
    pub fn issue(&self, subject: &str, ttl: Duration) -> CoreResult<IssuedToken> {
        let now = unix_now()?;
        let expires_at = now
            .checked_add(ttl.as_secs())
            .ok_or_else(|| CoreError::Token(format!("token ttl of {ttl:?} overflows")))?;

        let token = self.sign(&Claims {
            sub: subject.to_string(),
            iat: now,
            exp: expires_at,
        })?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Returns the token subject, or [`CoreError::AuthInvalid`] for any
    /// signature, encoding or expiry failure.
    pub fn verify(&self, token: &str) -> CoreResult<String> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(kind = ?e.kind(), "token rejected");
            CoreError::AuthInvalid
        })?;

        if data.claims.sub.is_empty() {
            return Err(CoreError::AuthInvalid);
        }

        Ok(data.claims.sub)
    }

    fn sign(&self, claims: &Claims) -> CoreResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| CoreError::Token(e.to_string()))
    }
}

fn unix_now() -> CoreResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| CoreError::Token(format!("system clock before unix epoch: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::from_secs(1800))
    }

    #[test]
    fn issued_token_verifies_to_subject() {
        let tokens = service();
        let issued = tokens.issue("alice", Duration::from_secs(60)).unwrap();

        assert_eq!(tokens.verify(&issued.token).unwrap(), "alice");
    }

    #[test]
    fn expires_at_is_now_plus_ttl() {
        let before = unix_now().unwrap();
        let issued = service().issue("alice", Duration::from_secs(90)).unwrap();
        let after = unix_now().unwrap();

        assert!(issued.expires_at >= before + 90);
        assert!(issued.expires_at <= after + 90);
    }

    #[test]
    fn token_expired_one_second_ago_is_rejected() {
        let tokens = service();
        let now = unix_now().unwrap();
        let token = tokens
            .sign(&Claims {
                sub: "alice".to_string(),
                iat: now - 60,
                exp: now - 1,
            })
            .unwrap();

        assert!(matches!(tokens.verify(&token), Err(CoreError::AuthInvalid)));
    }

    #[test]
    fn token_expiring_this_second_is_accepted() {
        let tokens = service();
        let now = unix_now().unwrap();
        let token = tokens
            .sign(&Claims {
                sub: "alice".to_string(),
                iat: now,
                exp: now,
            })
            .unwrap();

        assert_eq!(tokens.verify(&token).unwrap(), "alice");
    }

    #[test]
    fn token_is_rejected_once_its_ttl_elapses() {
        let tokens = service();
        let issued = tokens.issue("alice", Duration::from_secs(1)).unwrap();
        assert_eq!(tokens.verify(&issued.token).unwrap(), "alice");

        while unix_now().unwrap() <= issued.expires_at {
            std::thread::sleep(Duration::from_millis(100));
        }
        assert!(matches!(tokens.verify(&issued.token), Err(CoreError::AuthInvalid)));
    }

    #[test]
    fn overflowing_ttl_is_an_error() {
        let result = service().issue("alice", Duration::from_secs(u64::MAX));

        assert!(matches!(result, Err(CoreError::Token(_))));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = TokenService::new(b"another-secret-another-secret-xx", Duration::from_secs(60));
        let issued = other.issue("alice", Duration::from_secs(60)).unwrap();

        assert!(matches!(
            service().verify(&issued.token),
            Err(CoreError::AuthInvalid)
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let tokens = service();
        let issued = tokens.issue("alice", Duration::from_secs(60)).unwrap();
        let forged = tokens.issue("mallory", Duration::from_secs(60)).unwrap();

        // Splice mallory's claims under alice's signature.
        let parts: Vec<&str> = issued.token.split('.').collect();
        let forged_parts: Vec<&str> = forged.token.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

        assert!(matches!(tokens.verify(&spliced), Err(CoreError::AuthInvalid)));
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(matches!(
            service().verify("not-a-token"),
            Err(CoreError::AuthInvalid)
        ));
        assert!(matches!(service().verify(""), Err(CoreError::AuthInvalid)));
    }

    #[test]
    fn empty_subject_is_rejected() {
        let tokens = service();
        let issued = tokens.issue("", Duration::from_secs(60)).unwrap();

        assert!(matches!(tokens.verify(&issued.token), Err(CoreError::AuthInvalid)));
    }
}
