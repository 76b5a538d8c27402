//! Client configuration.
//!
//! `Config` is built once, handed to `Client::new`, and never mutated
//! afterwards. `from_env` reads the same settings from `MAXBOT_*`
//! environment variables for embedding applications that configure through
//! the environment.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://botapi.max.ru/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the access token is attached to outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPlacement {
    /// `access_token` query parameter.
    #[default]
    Query,
    /// `Authorization` header.
    Header,
}

impl std::str::FromStr for AuthPlacement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" => Ok(AuthPlacement::Query),
            "header" => Ok(AuthPlacement::Header),
            other => Err(Error::Config(format!(
                "unknown auth placement {other:?}, expected \"query\" or \"header\""
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub base_url: String,
    pub token: String,
    pub auth: AuthPlacement,
    /// Upper bound for a single exchange; a context deadline can shorten it.
    pub timeout: Option<Duration>,
    /// Sent as the `v` query parameter when set.
    pub api_version: Option<String>,
}

impl Config {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            auth: AuthPlacement::default(),
            timeout: Some(DEFAULT_TIMEOUT),
            api_version: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_auth(mut self, auth: AuthPlacement) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Reads `MAXBOT_TOKEN` (required), `MAXBOT_BASE_URL`, `MAXBOT_AUTH`,
    /// `MAXBOT_TIMEOUT_SECS` and `MAXBOT_API_VERSION`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("MAXBOT_TOKEN")
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Config("MAXBOT_TOKEN is not set".to_string()))?;
        let mut config = Config::new(token);

        if let Some(base_url) = lookup("MAXBOT_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(auth) = lookup("MAXBOT_AUTH") {
            config.auth = auth.parse()?;
        }
        if let Some(secs) = lookup("MAXBOT_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!("MAXBOT_TIMEOUT_SECS is not a number: {secs:?}"))
            })?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(version) = lookup("MAXBOT_API_VERSION") {
            config.api_version = Some(version);
        }
        Ok(config)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::new("secret");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.auth, AuthPlacement::Query);
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
        assert!(config.api_version.is_none());
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", Config::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn env_requires_token() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = Config::from_lookup(lookup(&[("MAXBOT_TOKEN", "")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("MAXBOT_TOKEN", "abc"),
            ("MAXBOT_BASE_URL", "http://localhost:3000/"),
            ("MAXBOT_AUTH", "Header"),
            ("MAXBOT_TIMEOUT_SECS", "5"),
            ("MAXBOT_API_VERSION", "1.2.5"),
        ]))
        .unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.base_url, "http://localhost:3000/");
        assert_eq!(config.auth, AuthPlacement::Header);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.api_version.as_deref(), Some("1.2.5"));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config =
            Config::from_lookup(lookup(&[("MAXBOT_TOKEN", "abc"), ("MAXBOT_TIMEOUT_SECS", "0")]))
                .unwrap();
        assert!(config.timeout.is_none());
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("MAXBOT_TOKEN", "abc"), ("MAXBOT_AUTH", "cookie")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = Config::from_lookup(lookup(&[
            ("MAXBOT_TOKEN", "abc"),
            ("MAXBOT_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
