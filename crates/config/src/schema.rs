//! Config schema types for the image search hook.

use std::{str::FromStr, time::Duration};

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

use crate::error::Error;

/// SauceNAO search endpoint, shared by the JSON API and the HTML page.
pub const SAUCENAO_SEARCH_URL: &str = "https://saucenao.com/search.php";

/// Browser-like agent sent by the HTML backend.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PicsearchConfig {
    pub search: SearchConfig,
    pub saucenao: SauceNaoConfig,
}

/// Backend selection and plugin lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Which search strategy the plugin constructs at startup.
    pub backend: BackendKind,

    /// How long shutdown waits for in-flight searches (seconds).
    pub shutdown_grace_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Api,
            shutdown_grace_secs: 10,
        }
    }
}

impl SearchConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Search strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SauceNAO JSON API (`output_type=2`).
    #[default]
    Api,
    /// SauceNAO search page, scraped.
    Html,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "html" => Ok(Self::Html),
            other => Err(Error::unknown_backend(other)),
        }
    }
}

/// SauceNAO settings shared by both backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SauceNaoConfig {
    /// API key (from SAUCENAO_API_KEY env or config). Optional; without it
    /// the API runs in anonymous, heavily rate-limited mode.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret",
        deserialize_with = "deserialize_option_secret"
    )]
    pub api_key: Option<Secret<String>>,

    /// JSON API endpoint.
    pub api_url: String,

    /// HTML search page endpoint.
    pub html_url: String,

    /// Number of results requested from the API.
    pub numres: u32,

    /// API hide level (0 = show all, 3 = hide explicit).
    pub hide: u8,

    /// Minimum similarity the API should return.
    pub minsim: u32,

    /// User-Agent header for the HTML backend.
    pub user_agent: String,

    /// Request timeout in seconds. `None` keeps the transport default.
    pub timeout_secs: Option<u64>,
}

impl Default for SauceNaoConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: SAUCENAO_SEARCH_URL.into(),
            html_url: SAUCENAO_SEARCH_URL.into(),
            numres: 5,
            hide: 0,
            minsim: 30,
            user_agent: DEFAULT_USER_AGENT.into(),
            timeout_secs: None,
        }
    }
}

impl SauceNaoConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// ── Secret serialization helpers ───────────────────────────────────────────

fn serialize_option_secret<S>(
    value: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use secrecy::ExposeSecret;
    match value {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_option_secret<'de, D>(deserializer: D) -> Result<Option<Secret<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.filter(|s| !s.trim().is_empty()).map(Secret::new))
}
