//! JSON:API client for the content site
//!
//! Every request goes through the token manager, which attaches a bearer
//! token when one is available.

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;

use crate::auth::{RequestOptions, TokenManager};
use crate::models::ErrorDocument;

const JSONAPI: &str = "application/vnd.api+json";

pub struct ContentClient {
    auth: TokenManager,
}

impl ContentClient {
    pub fn new(auth: TokenManager) -> Self {
        Self { auth }
    }

    fn options(method: Method) -> RequestOptions {
        RequestOptions::new(method)
            .header(ACCEPT, HeaderValue::from_static(JSONAPI))
            .header(CONTENT_TYPE, HeaderValue::from_static(JSONAPI))
    }

    /// GET a JSON:API path.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let resp = self
            .auth
            .fetch_with_authentication(path, Self::options(Method::GET))
            .await
            .with_context(|| format!("GET {} failed", path))?;

        check_response(resp, path).await
    }

    /// POST or PATCH a JSON:API document.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        document: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        let body = serde_json::to_vec(document).context("Failed to serialize document")?;
        let resp = self
            .auth
            .fetch_with_authentication(path, Self::options(method.clone()).body(body))
            .await
            .with_context(|| format!("{} {} failed", method, path))?;

        check_response(resp, path).await
    }

    /// DELETE a JSON:API resource.
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        let resp = self
            .auth
            .fetch_with_authentication(path, Self::options(Method::DELETE))
            .await
            .with_context(|| format!("DELETE {} failed", path))?;

        check_response(resp, path).await
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, path: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<ErrorDocument>(&body)
        .ok()
        .and_then(|doc| doc.errors.into_iter().next());

    if let Some(err) = api_error {
        bail!(
            "HTTP {} for {}: {}: {}",
            status.as_u16(),
            path,
            err.title.as_deref().unwrap_or("Error"),
            err.detail.as_deref().unwrap_or("(no detail)")
        );
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        bail!(
            "HTTP {} for {}. Not permitted -- run 'content-auth login'.",
            status.as_u16(),
            path
        );
    }
    bail!("HTTP {} for {}: {}", status.as_u16(), path, body);
}
