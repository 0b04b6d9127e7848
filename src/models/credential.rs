//! OAuth credential model

use serde::{Deserialize, Serialize};

/// A provider credential: durable token pair plus absolute expiry.
///
/// Owned by the credential manager once constructed and passed by reference
/// into client calls. A credential with an empty access or refresh token is
/// not usable; client operations reject it before issuing any request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry, seconds since the Unix epoch
    pub expires_at: i64,
}

impl Credential {
    /// Pure construction; no I/O, no validation beyond shape
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Whether this credential may back a provider call at all.
    ///
    /// Expiry is deliberately not checked here; a near-expiry token is
    /// still usable and refresh is the manager's concern.
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// Seconds remaining until expiry at the given time (negative if past)
    pub fn seconds_until_expiry(&self, now: i64) -> i64 {
        self.expires_at - now
    }
}
