//! Configuration structures for Headscale clients.
//!
//! A Headscale client needs exactly two things: the server endpoint and an API
//! key sent as a bearer token. The remaining fields tune TLS and timeouts.

use crate::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Environment variable holding the Headscale endpoint.
pub const ENDPOINT_ENV: &str = "HEADSCALE_ENDPOINT";

/// Environment variable holding the Headscale API key.
pub const API_KEY_ENV: &str = "HEADSCALE_API_KEY";

/// Configuration for a Headscale client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HeadscaleConfig {
    /// Headscale base URL (e.g. `https://headscale.example.com`)
    #[validate(url)]
    pub endpoint: String,

    /// API key sent as a bearer token
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub token: SecretString,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to a PEM encoded CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Optional request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

const fn default_tls_verify() -> bool {
    true
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl HeadscaleConfig {
    /// Create a new client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a usable `http`/`https` URL.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let config = Self {
            endpoint: endpoint.into(),
            token: SecretString::from(token.into()),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            request_timeout_secs: None,
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        config.parse_endpoint()?;

        Ok(config)
    }

    /// Build a configuration from `HEADSCALE_ENDPOINT` and `HEADSCALE_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is missing or the endpoint is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration using an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is missing or the endpoint is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENDPOINT_ENV)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::ConfigError(format!("{ENDPOINT_ENV} is not set")))?;
        let token = lookup(API_KEY_ENV)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::ConfigError(format!("{API_KEY_ENV} is not set")))?;

        Self::new(endpoint, token)
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set custom CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = Some(seconds);
        self
    }

    /// Get the request timeout as a Duration, if one is configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Parse and check the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or cannot serve as an API base.
    pub fn parse_endpoint(&self) -> Result<Url> {
        parse_endpoint(&self.endpoint)
    }
}

/// Parse a Headscale endpoint into a base URL.
///
/// The URL must use `http` or `https` and be able to carry a path.
///
/// # Errors
///
/// Returns [`Error::ConfigError`] describing why the endpoint was rejected.
pub fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::ConfigError(format!("Invalid Headscale endpoint `{raw}`: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::ConfigError(format!(
            "Invalid Headscale endpoint `{raw}`: unsupported scheme `{}`",
            url.scheme()
        )));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(Error::ConfigError(format!(
            "Invalid Headscale endpoint `{raw}`: missing host"
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    #[test]
    fn test_config_new() {
        let config = HeadscaleConfig::new("https://headscale.example.com", "hskey").unwrap();
        assert_eq!(config.endpoint, "https://headscale.example.com");
        assert_eq!(config.token.expose_secret(), "hskey");
        assert!(config.tls_verify);
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_config_invalid_url() {
        let err = HeadscaleConfig::new("not a url", "hskey").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_config_rejects_non_http_scheme() {
        let err = HeadscaleConfig::new("ftp://headscale.example.com", "hskey").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_parse_endpoint_rejects_cannot_be_a_base() {
        assert!(parse_endpoint("mailto:admin@example.com").is_err());
    }

    #[test]
    fn test_parse_endpoint_keeps_path() {
        let url = parse_endpoint("https://vpn.example.com:8443/headscale").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("vpn.example.com"));
        assert_eq!(url.port(), Some(8443));
        assert_eq!(url.path(), "/headscale");
    }

    #[test]
    fn test_config_builder() {
        let config = HeadscaleConfig::new("https://headscale.example.com", "hskey")
            .unwrap()
            .with_tls_verify(false)
            .with_ca_cert(PathBuf::from("/etc/ssl/headscale.pem"))
            .with_timeout(45);

        assert!(!config.tls_verify);
        assert_eq!(
            config.tls_ca_cert.as_deref(),
            Some(std::path::Path::new("/etc/ssl/headscale.pem"))
        );
        assert_eq!(config.timeout(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_config_validation_timeout_range() {
        let mut config = HeadscaleConfig::new("https://headscale.example.com", "hskey").unwrap();
        config.request_timeout_secs = Some(0);
        assert!(config.validate().is_err());

        config.request_timeout_secs = Some(301);
        assert!(config.validate().is_err());

        config.request_timeout_secs = Some(30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_lookup() {
        let vars = HashMap::from([
            (ENDPOINT_ENV, "http://127.0.0.1:8080"),
            (API_KEY_ENV, "secret"),
        ]);
        let config =
            HeadscaleConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:8080");
        assert_eq!(config.token.expose_secret(), "secret");
    }

    #[test]
    fn test_config_from_lookup_missing_key() {
        let vars = HashMap::from([(ENDPOINT_ENV, "http://127.0.0.1:8080")]);
        let err = HeadscaleConfig::from_lookup(|key| vars.get(key).map(ToString::to_string))
            .unwrap_err();
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn test_config_serialization_omits_token() {
        let config = HeadscaleConfig::new("https://headscale.example.com", "hskey").unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hskey"));
        assert!(!json.contains("token"));
    }

    #[test]
    fn test_config_deserialization() {
        let config: HeadscaleConfig = serde_json::from_str(
            r#"{"endpoint": "https://headscale.example.com", "token": "hskey", "request_timeout_secs": 20}"#,
        )
        .unwrap();
        assert_eq!(config.token.expose_secret(), "hskey");
        assert!(config.tls_verify);
        assert_eq!(config.timeout(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = HeadscaleConfig::new("https://headscale.example.com", "hskey").unwrap();
        assert!(!format!("{config:?}").contains("hskey"));
    }
}
