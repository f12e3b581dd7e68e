//! Client configuration

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// OAuth client and API settings. Every field has a default; a config file
/// only needs to name the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Base URL of the content site, without trailing slash
    pub base: String,
    /// Storage key the token record is kept under
    pub token_name: String,
    /// OAuth client ID (consumer UUID)
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Scope requested with the password grant
    pub scope: String,
    /// Seconds before the stated expiry at which a token is treated as stale
    pub expire_margin: i64,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            base: "http://localhost:32807".to_string(),
            token_name: "drupal-oauth-token".to_string(),
            client_id: "a089d4be-e089-4aa8-8b4c-b2c2b6a7a3e4".to_string(),
            client_secret: "reactnative".to_string(),
            scope: "oauth".to_string(),
            expire_margin: 0,
        }
    }
}

impl Credentials {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "content-auth", "content-auth")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from `path`, or from the default location.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Self::default().validated();
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let creds: Self = toml::from_str(content).context("Failed to parse config file")?;
        creds.validated()
    }

    /// Replace the base URL (e.g. from a CLI flag).
    pub fn with_base(mut self, base: impl Into<String>) -> Result<Self> {
        self.base = base.into();
        self.validated()
    }

    fn validated(mut self) -> Result<Self> {
        let parsed = url::Url::parse(&self.base)
            .with_context(|| format!("Invalid base URL {:?}", self.base))?;
        if parsed.cannot_be_a_base() {
            bail!("Base URL {:?} cannot carry a path", self.base);
        }
        let trimmed = self.base.trim_end_matches('/').len();
        self.base.truncate(trimmed);
        if self.token_name.is_empty() {
            bail!("token_name must not be empty");
        }
        Ok(self)
    }

    /// Token endpoint shared by the password and refresh grants.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let creds = Credentials::from_toml(
            r#"
            base = "https://cms.example.org/"
            expire_margin = 30
            "#,
        )
        .unwrap();

        assert_eq!(creds.base, "https://cms.example.org");
        assert_eq!(creds.expire_margin, 30);
        assert_eq!(creds.token_name, "drupal-oauth-token");
        assert_eq!(creds.scope, "oauth");
        assert_eq!(creds.token_url(), "https://cms.example.org/oauth/token");
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(Credentials::from_toml(r#"base = "not a url""#).is_err());
        assert!(Credentials::from_toml(r#"base = "mailto:x@example.org""#).is_err());
    }

    #[test]
    fn test_rejects_empty_token_name() {
        assert!(Credentials::from_toml(r#"token_name = """#).is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let creds = Credentials::load(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(creds, Credentials::default());
        assert_eq!(creds.client_secret, "reactnative");
    }

    #[test]
    fn test_with_base_override() {
        let creds = Credentials::default()
            .with_base("http://127.0.0.1:9000/")
            .unwrap();
        assert_eq!(creds.base, "http://127.0.0.1:9000");
    }
}
