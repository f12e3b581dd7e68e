//! Token lifecycle errors

use std::sync::Arc;

use crate::storage::StoreError;

/// Failure of a token operation.
///
/// `Clone` because one refresh outcome is handed to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The token endpoint answered with an `error` body.
    #[error(
        "grant rejected by server: {error}{}",
        .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
    )]
    GrantRejected {
        error: String,
        description: Option<String>,
    },

    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Network(Arc<reqwest::Error>),

    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Token endpoint body was not a usable grant response.
    #[error("invalid token endpoint response: {0}")]
    InvalidResponse(String),

    #[error("username and password must not be empty")]
    EmptyCredentials,

    #[error("token refresh ended without a result: {0}")]
    RefreshAborted(String),
}

impl AuthError {
    pub(crate) fn network(err: reqwest::Error) -> Self {
        Self::Network(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_rejected_display() {
        let err = AuthError::GrantRejected {
            error: "invalid_grant".into(),
            description: Some("The refresh token is invalid.".into()),
        };
        assert_eq!(
            err.to_string(),
            "grant rejected by server: invalid_grant (The refresh token is invalid.)"
        );

        let bare = AuthError::GrantRejected {
            error: "invalid_client".into(),
            description: None,
        };
        assert_eq!(bare.to_string(), "grant rejected by server: invalid_client");
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let err: AuthError = StoreError::InvalidKey("a/b".into()).into();
        assert_eq!(err.to_string(), "invalid storage key \"a/b\"");
    }
}
