//! SauceNAO JSON API backend.
//!
//! Uploads the image to `search.php` with `output_type=2` and returns the
//! typed result list untouched; ordering is the backend's.

use std::sync::atomic::{AtomicBool, Ordering};

use {
    async_trait::async_trait,
    picsearch_config::SauceNaoConfig,
    reqwest::{
        Client,
        multipart::{Form, Part},
    },
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    serde_json::Value,
    tracing::{debug, info, warn},
};

use {
    super::{RawBackendResult, SearchBackend, build_client},
    crate::{
        error::{Result, SearchError},
        payload::ImagePayload,
    },
};

/// Search every index.
const ALL_DATABASES: &str = "999";

/// JSON output mode.
const OUTPUT_TYPE_JSON: &str = "2";

/// SauceNAO API client. Built once and shared across concurrent searches.
pub struct SauceNaoApi {
    client: Client,
    api_key: Option<Secret<String>>,
    base_url: String,
    numres: u32,
    hide: u8,
    minsim: u32,
    closed: AtomicBool,
}

impl std::fmt::Debug for SauceNaoApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SauceNaoApi")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("numres", &self.numres)
            .finish()
    }
}

impl SauceNaoApi {
    /// Create a client with default settings.
    ///
    /// A missing key is not an error: the client runs anonymously, which
    /// SauceNAO rate-limits heavily.
    #[must_use]
    pub fn new(api_key: Option<Secret<String>>) -> Self {
        let defaults = SauceNaoConfig::default();
        Self::with_client(Client::new(), api_key, &defaults)
    }

    /// Create a client from config.
    pub fn from_config(config: &SauceNaoConfig) -> Result<Self> {
        let client = build_client(config)?;
        Ok(Self::with_client(client, config.api_key.clone(), config))
    }

    fn with_client(client: Client, api_key: Option<Secret<String>>, config: &SauceNaoConfig) -> Self {
        if api_key.is_some() {
            info!("SauceNAO API key configured");
        } else {
            warn!("SauceNAO API key not found, searches run anonymously and may be rate-limited");
        }
        Self {
            client,
            api_key,
            base_url: config.api_url.clone(),
            numres: config.numres,
            hide: config.hide,
            minsim: config.minsim,
            closed: AtomicBool::new(false),
        }
    }

    /// Point the client at another endpoint (mirrors, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("output_type", OUTPUT_TYPE_JSON.to_string()),
            ("numres", self.numres.to_string()),
            ("db", ALL_DATABASES.to_string()),
            ("hide", self.hide.to_string()),
            ("minsim", self.minsim.to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.expose_secret().clone()));
        }
        query
    }
}

#[async_trait]
impl SearchBackend for SauceNaoApi {
    fn id(&self) -> &'static str {
        "saucenao-api"
    }

    fn name(&self) -> &'static str {
        "SauceNAO API"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, payload: &ImagePayload) -> Result<RawBackendResult> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SearchError::Closed);
        }

        let image = payload.decode()?;
        let form = Form::new().part("file", Part::bytes(image).file_name("image"));

        let response = self
            .client
            .post(&self.base_url)
            .query(&self.query())
            .multipart(form)
            .send()
            .await
            .map_err(|e| SearchError::transport("failed to send SauceNAO API request", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::backend(format!(
                "SauceNAO API request failed: {status} - {body}"
            )));
        }

        let parsed: SauceNaoResponse = response
            .json()
            .await
            .map_err(|e| SearchError::transport("failed to parse SauceNAO API response", e))?;

        if parsed.header.status != 0 {
            let message = parsed
                .header
                .message
                .unwrap_or_else(|| format!("status {}", parsed.header.status));
            return Err(SearchError::backend(message));
        }

        debug!(
            results = parsed.results.len(),
            short_remaining = ?parsed.header.short_remaining,
            long_remaining = ?parsed.header.long_remaining,
            "SauceNAO API search complete"
        );
        Ok(RawBackendResult::Structured(parsed.results))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("SauceNAO API client closed");
        }
    }
}

// ── API Types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SauceNaoResponse {
    pub header: ResponseHeader,
    pub results: Vec<SauceNaoResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResponseHeader {
    /// 0 on success, >0 server-side failure, <0 client-side failure.
    pub status: i32,
    pub message: Option<String>,
    pub short_remaining: Option<i64>,
    pub long_remaining: Option<i64>,
}

/// One match, as returned by the API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SauceNaoResult {
    pub header: ResultHeader,
    pub data: ResultData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResultHeader {
    /// Percentage, sent as a string (`"87.50"`).
    pub similarity: Option<Value>,
    pub thumbnail: Option<String>,
    pub index_id: Option<i64>,
    pub index_name: Option<String>,
}

/// Index-specific match data. Each index fills a different subset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResultData {
    pub ext_urls: Vec<String>,
    pub title: Option<String>,
    pub eng_name: Option<String>,
    pub jp_name: Option<String>,
    pub material: Option<String>,
    pub source: Option<String>,
    pub member_name: Option<String>,
    pub member_id: Option<Value>,
    pub pixiv_id: Option<Value>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    /// String or array of strings, depending on the index.
    pub creator: Option<Value>,
    pub artist: Option<String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ImagePayload {
        ImagePayload::new("ZmFrZSBpbWFnZSBieXRlcw==").unwrap()
    }

    #[test]
    fn metadata_and_degraded_mode() {
        let anonymous = SauceNaoApi::new(None);
        assert_eq!(anonymous.id(), "saucenao-api");
        assert_eq!(anonymous.name(), "SauceNAO API");
        assert!(!anonymous.is_configured());
        assert!(anonymous.query().iter().all(|(k, _)| *k != "api_key"));

        let keyed = SauceNaoApi::new(Some(Secret::new("k".into())));
        assert!(keyed.is_configured());
        assert!(keyed.query().contains(&("api_key", "k".to_string())));
    }

    #[test]
    fn default_query_shows_all_results() {
        let query = SauceNaoApi::new(None).query();
        assert_eq!(query, vec![
            ("output_type", "2".to_string()),
            ("numres", "5".to_string()),
            ("db", "999".to_string()),
            ("hide", "0".to_string()),
            ("minsim", "30".to_string()),
        ]);
    }

    #[test]
    fn debug_redacts_api_key() {
        let api = SauceNaoApi::new(Some(Secret::new("super-secret-key".into())));
        let debug_output = format!("{api:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-key"));
    }

    #[test]
    fn parses_api_response() {
        let json = r#"{
            "header": {"status": 0, "short_remaining": 3, "long_remaining": 99},
            "results": [{
                "header": {"similarity": "87.50", "index_id": 5, "index_name": "Index #5: Pixiv Images - 12345.jpg"},
                "data": {
                    "ext_urls": ["https://www.pixiv.net/member_illust.php?mode=medium&illust_id=12345"],
                    "title": "Sunset",
                    "pixiv_id": 12345,
                    "member_name": "painter",
                    "member_id": 678
                }
            }, {
                "header": {"similarity": "40.10", "index_name": "Index #9: Danbooru"},
                "data": {"creator": ["someone", "else"], "material": "original"}
            }]
        }"#;
        let response: SauceNaoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.header.short_remaining, Some(3));
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].data.title.as_deref(), Some("Sunset"));
        assert!(response.results[1].data.creator.as_ref().unwrap().is_array());
    }

    #[test]
    fn minimal_response_parses() {
        let response: SauceNaoResponse = serde_json::from_str(r#"{"header": {}}"#).unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.header.status, 0);
    }

    #[tokio::test]
    async fn decode_failure_skips_network() {
        // Unroutable base URL: a request would fail with a transport error.
        let api = SauceNaoApi::new(None).with_base_url("http://127.0.0.1:9/search.php");
        let err = api
            .search(&ImagePayload::new("not base64 at all!").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Decode(_)));
    }

    #[tokio::test]
    async fn closed_client_refuses_searches() {
        let api = SauceNaoApi::new(None);
        api.close().await;
        api.close().await;
        assert!(matches!(api.search(&payload()).await, Err(SearchError::Closed)));
    }

    // ── Integration Tests with Mock Server ─────────────────────────────────

    mod integration {
        use {
            super::*,
            wiremock::{
                Mock, MockServer, ResponseTemplate,
                matchers::{body_string_contains, method, path, query_param},
            },
        };

        #[tokio::test]
        async fn search_success_returns_results_in_backend_order() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/search.php"))
                .and(query_param("output_type", "2"))
                .and(query_param("db", "999"))
                .and(query_param("hide", "0"))
                .and(query_param("api_key", "test-key"))
                .and(body_string_contains("name=\"file\""))
                .and(body_string_contains("fake image bytes"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "header": {"status": 0},
                    "results": [
                        {"header": {"similarity": "91.0"}, "data": {"title": "best"}},
                        {"header": {"similarity": "95.0"}, "data": {"title": "later"}}
                    ]
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let api = SauceNaoApi::new(Some(Secret::new("test-key".into())))
                .with_base_url(format!("{}/search.php", mock_server.uri()));

            match api.search(&payload()).await.unwrap() {
                RawBackendResult::Structured(results) => {
                    assert_eq!(results.len(), 2);
                    assert_eq!(results[0].data.title.as_deref(), Some("best"));
                },
                other => panic!("expected structured result, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn http_error_is_backend_failure_without_retry() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/search.php"))
                .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
                .expect(1)
                .mount(&mock_server)
                .await;

            let api = SauceNaoApi::new(None)
                .with_base_url(format!("{}/search.php", mock_server.uri()));

            let err = api.search(&payload()).await.unwrap_err();
            assert!(matches!(err, SearchError::Backend { .. }));
            assert!(err.to_string().contains("429"));
        }

        #[tokio::test]
        async fn header_status_error_is_backend_failure() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/search.php"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "header": {"status": -2, "message": "Search Rate Too High."}
                })))
                .mount(&mock_server)
                .await;

            let api = SauceNaoApi::new(None)
                .with_base_url(format!("{}/search.php", mock_server.uri()));

            let err = api.search(&payload()).await.unwrap_err();
            assert!(err.to_string().contains("Search Rate Too High."));
        }

        #[tokio::test]
        async fn garbage_body_is_transport_failure() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/search.php"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
                .mount(&mock_server)
                .await;

            let api = SauceNaoApi::new(None)
                .with_base_url(format!("{}/search.php", mock_server.uri()));

            assert!(matches!(
                api.search(&payload()).await,
                Err(SearchError::Transport { .. })
            ));
        }
    }
}
