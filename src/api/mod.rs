//! Content API commands

pub mod articles;
pub mod client;

use anyhow::{Context, Result};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;

use crate::auth::{RequestOptions, TokenManager};

pub use client::ContentClient;

/// Parse a `Name: value` header line as given on the command line.
pub fn parse_header(line: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = line
        .split_once(':')
        .with_context(|| format!("Header {:?} is not in 'Name: value' form", line))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("Invalid header name in {:?}", line))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("Invalid header value in {:?}", line))?;
    Ok((name, value))
}

/// Issue a raw request through the token manager and print the response.
pub async fn fetch(
    auth: &TokenManager,
    path: &str,
    method: &str,
    headers: &[String],
    data: Option<String>,
) -> Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method {:?}", method))?;

    let mut options = RequestOptions::new(method);
    for line in headers {
        let (name, value) = parse_header(line)?;
        options = options.header(name, value);
    }
    if let Some(data) = data {
        options = options.body(data);
    }

    let resp = auth
        .fetch_with_authentication(path, options)
        .await
        .with_context(|| format!("Request to {} failed", path))?;

    println!("HTTP {}", resp.status());
    let body = resp.text().await.context("Failed to read response body")?;
    if !body.is_empty() {
        println!("{}", body);
    }
    Ok(())
}

/// Print the site's view of the current credentials.
pub async fn debug(auth: &TokenManager) -> Result<()> {
    let info = auth.debug().await.context("OAuth debug request failed")?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
