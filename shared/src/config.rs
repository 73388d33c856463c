//! Backend configuration: where the analysis and chat endpoints live.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::DEFAULT_LOCATION_TIMEOUT_MS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid API base '{value}': {reason}")]
    InvalidApiBase { value: String, reason: String },

    #[error("malformed config document: {0}")]
    Malformed(String),

    #[error("could not fetch config document: {0}")]
    Fetch(String),
}

/// Validated backend root, stored without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiBase(String);

impl ApiBase {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| ConfigError::InvalidApiBase {
            value: trimmed.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("only http and https are supported"));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials are not allowed"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed"));
        }

        Ok(Self(url.as_str().trim_end_matches('/').to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{base}/{path}` with exactly one slash between the two.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl std::fmt::Display for ApiBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "api_base", rename_all = "snake_case")]
pub enum ApiConfig {
    #[default]
    NotConfigured,
    Configured(ApiBase),
}

impl ApiConfig {
    /// Resolve an optional raw value. Blank means "not configured"; an
    /// unusable value is an error so the caller can log it.
    pub fn from_raw(raw: Option<&str>) -> Result<Self, ConfigError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::NotConfigured),
            Some(value) => ApiBase::parse(value).map(Self::Configured),
        }
    }

    #[must_use]
    pub fn base(&self) -> Option<&ApiBase> {
        match self {
            ApiConfig::Configured(base) => Some(base),
            ApiConfig::NotConfigured => None,
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        matches!(self, ApiConfig::Configured(_))
    }
}

/// Static `config.json` served next to the client.
#[derive(Debug, Clone, Default, Deserialize)]
struct StaticConfig {
    #[serde(rename = "API_BASE", alias = "api_base", default)]
    api_base: Option<String>,
}

/// Parse a static config document into an [`ApiConfig`].
pub fn parse_static_config(bytes: &[u8]) -> Result<ApiConfig, ConfigError> {
    let doc: StaticConfig =
        serde_json::from_slice(bytes).map_err(|e| ConfigError::Malformed(e.to_string()))?;
    ApiConfig::from_raw(doc.api_base.as_deref())
}

/// Handed to the core when the UI mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub api_base: Option<String>,
    pub location_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            location_timeout_ms: DEFAULT_LOCATION_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    #[must_use]
    pub fn with_location_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.location_timeout_ms = timeout_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let base = ApiBase::parse("http://localhost:8001/").unwrap();
        assert_eq!(base.as_str(), "http://localhost:8001");
        assert_eq!(base.endpoint("/analyze/quick"), "http://localhost:8001/analyze/quick");
    }

    #[test]
    fn keeps_path_prefix() {
        let base = ApiBase::parse("https://derma.example.com/api/v1/").unwrap();
        assert_eq!(base.endpoint("chat"), "https://derma.example.com/api/v1/chat");
    }

    #[test]
    fn rejects_unusable_values() {
        assert!(ApiBase::parse("ftp://example.com").is_err());
        assert!(ApiBase::parse("not a url").is_err());
        assert!(ApiBase::parse("http://user:pw@example.com").is_err());
        assert!(ApiBase::parse("http://example.com/?x=1").is_err());
    }

    #[test]
    fn blank_means_not_configured() {
        assert_eq!(ApiConfig::from_raw(None), Ok(ApiConfig::NotConfigured));
        assert_eq!(ApiConfig::from_raw(Some("   ")), Ok(ApiConfig::NotConfigured));
        assert!(ApiConfig::from_raw(Some("http://localhost:8001"))
            .unwrap()
            .is_configured());
    }

    #[test]
    fn static_config_accepts_both_spellings() {
        let upper = parse_static_config(br#"{"API_BASE": "http://localhost:8000"}"#).unwrap();
        assert_eq!(upper.base().map(ApiBase::as_str), Some("http://localhost:8000"));

        let lower = parse_static_config(br#"{"api_base": "http://localhost:9000/"}"#).unwrap();
        assert_eq!(lower.base().map(ApiBase::as_str), Some("http://localhost:9000"));

        assert_eq!(parse_static_config(b"{}"), Ok(ApiConfig::NotConfigured));
        assert!(matches!(
            parse_static_config(b"<html>"),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.location_timeout_ms, DEFAULT_LOCATION_TIMEOUT_MS);
        assert!(config.api_base.is_none());
    }
}
