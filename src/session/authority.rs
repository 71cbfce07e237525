use crate::session::error::TokenError;
use anyhow::{Result, anyhow};
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Appended to the shared password to form the HMAC key.
pub const SECRET_SUFFIX: &str = "_session_secret";

/// Signatures keep the first 16 bytes (32 hex chars) of the HMAC-SHA256 digest.
pub const SIGNATURE_BYTES: usize = 16;

pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A session token that was either just issued or has passed verification.
///
/// Wire form is `{issued_at_millis}.{signature}`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionToken {
    issued_at_millis: i64,
    signature: String,
}

impl SessionToken {
    pub fn issued_at_millis(&self) -> i64 {
        self.issued_at_millis
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.issued_at_millis, self.signature)
    }
}

/// Issues and validates session tokens.
///
/// Holds nothing but the keyed MAC and the session lifetime. Validity of a
/// token is recomputed from the token bytes, the key and the current time on
/// every call, so there is no session store and nothing to revoke.
#[derive(Clone)]
pub struct TokenAuthority {
    mac: HmacSha256,
    lifetime: Duration,
    lifetime_millis: i64,
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    /// Derive the signing key from the shared password.
    pub fn new(password: &str, lifetime: Duration) -> Result<Self> {
        if password.is_empty() {
            return Err(anyhow!("Shared password must not be empty"));
        }

        let lifetime_millis = i64::try_from(lifetime.as_millis())
            .map_err(|_| anyhow!("Session lifetime {lifetime:?} is out of range"))?;
        if lifetime_millis == 0 {
            return Err(anyhow!("Session lifetime must be greater than zero"));
        }

        let secret = format!("{password}{SECRET_SUFFIX}");
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|error| anyhow!("Failed to key session MAC: {error}"))?;

        Ok(Self {
            mac,
            lifetime,
            lifetime_millis,
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token stamped with the current time.
    pub fn issue(&self) -> SessionToken {
        self.issue_at(now_millis())
    }

    pub fn issue_at(&self, now_millis: i64) -> SessionToken {
        let signature = self.sign(&now_millis.to_string());
        SessionToken {
            issued_at_millis: now_millis,
            signature,
        }
    }

    /// Accept or reject a client-supplied token against the current time.
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, now_millis())
    }

    pub fn validate_at(&self, token: &str, now_millis: i64) -> bool {
        match self.verify_at(token, now_millis) {
            Ok(_) => true,
            Err(reason) => {
                debug!(%reason, "Session token rejected");
                false
            }
        }
    }

    pub fn verify(&self, token: &str) -> Result<SessionToken, TokenError> {
        self.verify_at(token, now_millis())
    }

    /// Verify a token, reporting which check failed.
    ///
    /// Checks run in a fixed order: shape, signature, timestamp, age. The
    /// signature is compared before the timestamp is parsed so that nothing
    /// about an unsigned timestamp is ever interpreted.
    pub fn verify_at(&self, token: &str, now_millis: i64) -> Result<SessionToken, TokenError> {
        let mut parts = token.split('.');
        let (Some(issued_at), Some(signature), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };
        if issued_at.is_empty() || signature.is_empty() {
            return Err(TokenError::Malformed);
        }

        let expected = self.sign(issued_at);
        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            return Err(TokenError::SignatureMismatch);
        }

        let issued_at_millis = issued_at
            .parse::<i64>()
            .map_err(|_| TokenError::InvalidTimestamp)?;

        let age = now_millis
            .checked_sub(issued_at_millis)
            .ok_or(TokenError::InvalidTimestamp)?;
        if age < 0 {
            return Err(TokenError::IssuedInFuture);
        }
        if age > self.lifetime_millis {
            return Err(TokenError::Expired);
        }

        Ok(SessionToken {
            issued_at_millis,
            signature: expected,
        })
    }

    fn sign(&self, issued_at: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(issued_at.as_bytes());
        let digest = mac.finalize().into_bytes();
        hex::encode(&digest[..SIGNATURE_BYTES])
    }
}
