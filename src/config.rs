//! Runtime configuration.
//!
//! Values are layered with figment: built-in defaults, then an optional TOML
//! file, then `PROXY_`-prefixed environment variables (`PROXY_ORIGIN_PREFIX`,
//! `PROXY_BLOCKED_ORIGINS`, ...). `PORT` and `LOG_LEVEL` are also read
//! without the prefix since most hosting platforms set them that way.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::proxy::transport::DEFAULT_USER_AGENT;
use crate::proxy::{ProxyConfig, RedirectMode};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base level for this crate's logs; `RUST_LOG` overrides the whole filter.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Default target and base for root-relative links.
    #[serde(default = "default_origin_prefix")]
    pub origin_prefix: String,
    /// Host substrings to route through the proxy. Defaults to the origin's host.
    #[serde(default, deserialize_with = "deserialize_list")]
    pub blocked_origins: Vec<String>,
    #[serde(default = "default_proxy_path_prefix")]
    pub proxy_path_prefix: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    #[serde(default)]
    pub redirect_mode: RedirectMode,
    /// HTML fragment inserted at the top of every proxied page.
    #[serde(default)]
    pub banner_html: Option<String>,
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_origin_prefix() -> String {
    "http://thepiratebay.org".to_string()
}

fn default_proxy_path_prefix() -> String {
    "/".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_redirects() -> u32 {
    5
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Config {
    /// Load from the environment, with `path` (if any) underneath it.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file_exact(path));
        }
        let figment = figment
            .merge(Env::raw().only(&["PORT", "LOG_LEVEL"]))
            .merge(Env::prefixed("PROXY_"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: Config = figment.extract().context("Failed to load config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let origin = Url::parse(&self.origin_prefix)
            .with_context(|| format!("origin_prefix is not a valid URL: {}", self.origin_prefix))?;
        if origin.host_str().is_none() {
            anyhow::bail!("origin_prefix has no host: {}", self.origin_prefix);
        }
        if !self.proxy_path_prefix.starts_with('/') || !self.proxy_path_prefix.ends_with('/') {
            anyhow::bail!(
                "proxy_path_prefix must start and end with '/': {}",
                self.proxy_path_prefix
            );
        }
        Ok(())
    }

    /// The rewrite settings derived from this configuration.
    pub fn proxy_config(&self) -> ProxyConfig {
        let mut config = if self.blocked_origins.is_empty() {
            ProxyConfig::for_origin(&self.origin_prefix)
        } else {
            ProxyConfig::new(self.origin_prefix.clone(), self.blocked_origins.clone())
        };
        config.proxy_path_prefix = self.proxy_path_prefix.clone();
        config
    }

    /// Longest one proxied request may take.
    ///
    /// reqwest's timeout already spans automatic redirects. Manual mode makes
    /// up to `max_redirects + 1` HEAD probes before the real fetch, each with
    /// its own timeout.
    pub fn upstream_deadline(&self) -> Duration {
        let attempts = match self.redirect_mode {
            RedirectMode::Auto => 1,
            RedirectMode::Manual => self.max_redirects.saturating_add(2),
        };
        self.request_timeout
            .checked_mul(attempts)
            .unwrap_or(Duration::MAX)
    }

    /// The configured banner, ignoring blank values.
    pub fn banner(&self) -> Option<&str> {
        self.banner_html
            .as_deref()
            .map(str::trim)
            .filter(|html| !html.is_empty())
    }
}

/// Accepts either a list or a comma-separated string.
fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    let items = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(value) => value.split(',').map(str::to_owned).collect(),
        StringOrList::Many(values) => values,
    };
    Ok(items
        .into_iter()
        .map(|item| item.trim().to_owned())
        .filter(|item| !item.is_empty())
        .collect())
}

/// Accepts a bare number of seconds or a duration string such as `30s` or `500ms`.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SecondsOrText {
        Seconds(u64),
        Text(String),
    }

    match SecondsOrText::deserialize(deserializer)? {
        SecondsOrText::Seconds(secs) => Ok(Duration::from_secs(secs)),
        SecondsOrText::Text(text) => {
            let parsed = fundu::DurationParser::new()
                .parse(text.trim())
                .map_err(|e| serde::de::Error::custom(format!("invalid duration {text:?}: {e}")))?;
            Duration::try_from(parsed)
                .map_err(|e| serde::de::Error::custom(format!("invalid duration {text:?}: {e}")))
        }
    }
}
