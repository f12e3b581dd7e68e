//! Grant responses and the persisted token record

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use super::AuthError;

/// Body of a token endpoint response, before it is known to be a success.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A successful grant: all required fields present, no `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: Option<String>,
    pub extra: Map<String, Value>,
}

impl GrantResponse {
    /// An `error` field wins over everything else in the body.
    pub fn into_grant(self) -> Result<Grant, AuthError> {
        if let Some(error) = self.error {
            return Err(AuthError::GrantRejected {
                error,
                description: self.error_description,
            });
        }

        let missing = [
            ("access_token", self.access_token.is_none()),
            ("refresh_token", self.refresh_token.is_none()),
            ("expires_in", self.expires_in.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect::<Vec<_>>();

        match (self.access_token, self.refresh_token, self.expires_in) {
            (Some(access_token), Some(refresh_token), Some(expires_in)) => Ok(Grant {
                access_token,
                refresh_token,
                expires_in,
                token_type: self.token_type,
                extra: self.extra,
            }),
            _ => Err(AuthError::InvalidResponse(format!(
                "missing {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Persisted token: the grant plus issuance time and absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Issuance, seconds since epoch
    pub date: u64,
    /// `date + expires_in`
    pub expires_at: u64,
    /// Any other grant fields, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Token {
    /// Stamp a grant issued at `now`. Expiry is always derived here.
    pub fn issue(grant: Grant, now: u64) -> Self {
        let mut extra = grant.extra;
        extra.remove("date");
        extra.remove("expires_at");

        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_in: grant.expires_in,
            token_type: grant.token_type,
            date: now,
            expires_at: now.saturating_add(grant.expires_in),
            extra,
        }
    }

    /// Stale once `expires_at - margin` has passed.
    pub fn is_stale(&self, expire_margin: i64, now: u64) -> bool {
        let deadline = i128::from(self.expires_at) - i128::from(expire_margin);
        deadline < i128::from(now)
    }
}

/// Current time in whole seconds since the epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
