//! OAuth token lifecycle: password login, refresh, persistence, and the
//! authenticated fetch wrapper.
//!
//! The token record is never cached in memory. Every read goes through the
//! store so that the store stays the single source of truth.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};

use super::tokens::{now_secs, Grant, GrantResponse, Token};
use super::{AuthError, RequestOptions};
use crate::config::Credentials;
use crate::storage::{KeyValueStore, StoreError};

/// Outcome of one refresh, awaitable by any number of callers.
type PendingRefresh = Shared<BoxFuture<'static, Result<Token, AuthError>>>;

/// Refreshes in flight, keyed by the refresh token being exchanged.
type InFlight = Arc<Mutex<HashMap<String, PendingRefresh>>>;

/// Acquires, persists and refreshes bearer tokens. Cheap to clone; clones
/// share the store and the in-flight refresh registry.
#[derive(Clone)]
pub struct TokenManager {
    http: reqwest::Client,
    credentials: Arc<Credentials>,
    store: Arc<dyn KeyValueStore>,
    in_flight: InFlight,
}

/// Drops the registry entry when the refresh task ends, however it ends.
struct InFlightGuard {
    in_flight: InFlight,
    refresh_token: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.refresh_token);
    }
}

impl TokenManager {
    pub fn new(credentials: Credentials, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_client(reqwest::Client::new(), credentials, store)
    }

    pub fn with_client(
        http: reqwest::Client,
        credentials: Credentials,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            http,
            credentials: Arc::new(credentials),
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Exchange a username and password for a token (password grant).
    pub async fn login(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::EmptyCredentials);
        }

        tracing::info!("Requesting token for user {}", username);
        let creds = &self.credentials;
        let grant = self
            .request_grant(&[
                ("grant_type", "password"),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("scope", creds.scope.as_str()),
                ("username", username),
                ("password", password),
            ])
            .await?;

        let token = self.save_token(grant).await?;
        tracing::info!("Logged in, token expires at {}", token.expires_at);
        Ok(token)
    }

    /// Delete the stored token. Deleting an absent token is not an error.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.store.remove(&self.credentials.token_name).await?;
        tracing::info!("Stored token removed");
        Ok(())
    }

    /// Whether a usable token can be obtained right now. Never fails.
    pub async fn is_logged_in(&self) -> bool {
        match self.token().await {
            Ok(token) => token.is_some(),
            Err(e) => {
                tracing::warn!("Could not read stored token: {}", e);
                false
            }
        }
    }

    /// Current token, refreshed first if it is stale.
    ///
    /// `Ok(None)` means not logged in: nothing stored, or the refresh failed.
    /// Only a store failure is returned as an error.
    pub async fn token(&self) -> Result<Option<Token>, AuthError> {
        let Some(token) = self.load_token().await? else {
            return Ok(None);
        };

        if !token.is_stale(self.credentials.expire_margin, now_secs()) {
            return Ok(Some(token));
        }

        tracing::debug!("Stored token is stale (expires_at {})", token.expires_at);
        match self.refresh_token(&token.refresh_token).await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(e) => {
                tracing::warn!("Token refresh failed, treating as logged out: {}", e);
                Ok(None)
            }
        }
    }

    /// Exchange `refresh_token` for a new token (refresh grant).
    ///
    /// Concurrent calls with the same refresh token share one request and
    /// all observe its outcome.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Token, AuthError> {
        let pending = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(pending) = in_flight.get(refresh_token).cloned() {
                tracing::debug!("Joining token refresh already in flight");
                pending
            } else {
                let pending = self.spawn_refresh(refresh_token);
                in_flight.insert(refresh_token.to_string(), pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Start the refresh task. Caller holds the registry lock, so the entry
    /// is in place before the task can finish and remove it.
    fn spawn_refresh(&self, refresh_token: &str) -> PendingRefresh {
        let manager = self.clone();
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            refresh_token: refresh_token.to_string(),
        };

        let task = tokio::spawn(async move {
            let outcome = manager.exchange_refresh_token(&guard.refresh_token).await;
            drop(guard);
            outcome
        });

        task.map(|joined| {
            joined.unwrap_or_else(|e| Err(AuthError::RefreshAborted(e.to_string())))
        })
        .boxed()
        .shared()
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<Token, AuthError> {
        tracing::info!("Refreshing access token...");
        let creds = &self.credentials;
        // No scope here: the grant server rejects it on refresh
        let grant = self
            .request_grant(&[
                ("grant_type", "refresh_token"),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ])
            .await?;

        let token = self.save_token(grant).await?;
        tracing::info!("Token refreshed, expires at {}", token.expires_at);
        Ok(token)
    }

    /// POST a form to the token endpoint and interpret the body.
    /// The body decides success, not the status code.
    async fn request_grant(&self, form: &[(&str, &str)]) -> Result<Grant, AuthError> {
        let url = self.credentials.token_url();
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(AuthError::network)?;

        let status = resp.status();
        let body = resp.text().await.map_err(AuthError::network)?;
        let parsed: GrantResponse = serde_json::from_str(&body).map_err(|e| {
            AuthError::InvalidResponse(format!("HTTP {}, body is not JSON: {}", status.as_u16(), e))
        })?;

        parsed.into_grant().map_err(|e| {
            tracing::warn!("Token endpoint refused grant (HTTP {}): {}", status.as_u16(), e);
            e
        })
    }

    /// Stamp and persist a grant under the configured key.
    pub async fn save_token(&self, grant: Grant) -> Result<Token, AuthError> {
        let token = Token::issue(grant, now_secs());
        let key = &self.credentials.token_name;
        let json = serde_json::to_string(&token).map_err(|e| StoreError::Serialize {
            key: key.clone(),
            source: Arc::new(e),
        })?;
        self.store.set(key, &json).await?;
        Ok(token)
    }

    async fn load_token(&self) -> Result<Option<Token>, AuthError> {
        let key = &self.credentials.token_name;
        let Some(json) = self.store.get(key).await? else {
            return Ok(None);
        };
        let token = serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            source: Arc::new(e),
        })?;
        Ok(Some(token))
    }

    /// Issue `options` against `base + path`, adding a bearer token when one
    /// is available and the caller did not set `Authorization` already.
    ///
    /// Token problems never fail the request; it goes out anonymously. The
    /// response is returned whatever its status.
    pub async fn fetch_with_authentication(
        &self,
        path: &str,
        mut options: RequestOptions,
    ) -> Result<reqwest::Response, AuthError> {
        if !options.has_authorization() {
            match self.token().await {
                Ok(Some(token)) => {
                    match HeaderValue::from_str(&format!("Bearer {}", token.access_token)) {
                        Ok(mut value) => {
                            value.set_sensitive(true);
                            options.headers.insert(AUTHORIZATION, value);
                        }
                        Err(_) => tracing::warn!(
                            "Access token is not a valid header value, sending request without it"
                        ),
                    }
                }
                Ok(None) => tracing::debug!("No token available, sending anonymous request"),
                Err(e) => tracing::warn!("Token lookup failed, sending anonymous request: {}", e),
            }
        }

        let url = format!("{}{}", self.credentials.base, path);
        tracing::debug!("{} {}", options.method, url);

        let mut request = self.http.request(options.method, &url).headers(options.headers);
        if let Some(body) = options.body {
            request = request.body(body);
        }
        request.send().await.map_err(AuthError::network)
    }

    /// Query the site's OAuth debug endpoint with the current credentials.
    pub async fn debug(&self) -> Result<serde_json::Value, AuthError> {
        let options = RequestOptions::default().header(
            ACCEPT,
            HeaderValue::from_static("application/vnd.api+json"),
        );
        let resp = self
            .fetch_with_authentication("/oauth/debug?_format=json", options)
            .await?;
        resp.json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("debug endpoint: {}", e)))
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
