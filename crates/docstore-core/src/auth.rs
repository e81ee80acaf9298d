//! Bearer-token access control.
//!
//! A single static shared secret guards every operation except the liveness
//! check. Tokens are compared in constant time over their SHA-256 digests,
//! so neither content nor length of the secret leaks through timing.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

/// Validates presented credentials against the configured secret.
#[derive(Clone)]
pub struct AccessController {
    secret_digest: Option<[u8; 32]>,
}

impl std::fmt::Debug for AccessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("configured", &self.is_configured())
            .finish()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

impl AccessController {
    /// Build a controller. An empty secret counts as not configured.
    pub fn new(secret: Option<String>) -> Self {
        let secret_digest = secret.filter(|s| !s.is_empty()).map(|s| digest(&s));
        Self { secret_digest }
    }

    pub fn is_configured(&self) -> bool {
        self.secret_digest.is_some()
    }

    /// Check a presented credential.
    ///
    /// Fails with [`Error::MisconfiguredServer`] when no secret is configured
    /// and with [`Error::Unauthorized`] when the credential is missing or wrong.
    pub fn verify(&self, presented: Option<&str>) -> Result<()> {
        let expected = self
            .secret_digest
            .as_ref()
            .ok_or_else(|| Error::MisconfiguredServer("API_KEY not configured".to_string()))?;

        let presented = presented
            .ok_or_else(|| Error::Unauthorized("Missing bearer token".to_string()))?;

        if bool::from(digest(presented)[..].ct_eq(&expected[..])) {
            Ok(())
        } else {
            Err(Error::Unauthorized("Invalid API key".to_string()))
        }
    }

    /// Check the raw value of an `Authorization` header.
    pub fn verify_header(&self, header: Option<&str>) -> Result<()> {
        self.verify(header.and_then(bearer_token))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively; an empty token yields `None`.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
