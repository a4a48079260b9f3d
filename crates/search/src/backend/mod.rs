//! Search backend abstraction and the SauceNAO implementations.

mod saucenao_api;
mod saucenao_html;

pub use {
    saucenao_api::{ResponseHeader, ResultData, ResultHeader, SauceNaoApi, SauceNaoResponse, SauceNaoResult},
    saucenao_html::SauceNaoHtml,
};

use std::sync::Arc;

use {
    async_trait::async_trait,
    picsearch_config::{BackendKind, SauceNaoConfig},
    reqwest::Client,
};

use crate::{
    error::{Result, SearchError},
    format::format_record,
    html_extract::extract_summary,
    payload::ImagePayload,
    record::normalize_api_results,
};

/// What a backend hands back before normalization. Created per request and
/// dropped once summarized.
#[derive(Debug, Clone)]
pub enum RawBackendResult {
    /// Typed API results, best match first.
    Structured(Vec<SauceNaoResult>),
    /// The search page body.
    Html(String),
}

impl RawBackendResult {
    /// Normalize and render into the reply text.
    ///
    /// Empty results come back as [`SearchError::NoResults`] or
    /// [`SearchError::NoResultBlock`].
    pub fn summarize(&self) -> Result<String> {
        match self {
            Self::Structured(results) => normalize_api_results(results).map(|r| format_record(&r)),
            Self::Html(body) => extract_summary(body),
        }
    }
}

/// Reverse image search backend.
///
/// One call is one network round trip; implementations never retry.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend identifier (e.g. "saucenao-api").
    fn id(&self) -> &'static str;

    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Whether the backend has everything it needs for full service.
    fn is_configured(&self) -> bool;

    /// Decode the payload and submit it.
    async fn search(&self, payload: &ImagePayload) -> Result<RawBackendResult>;

    /// Release long-lived resources. Calls after this fail with
    /// [`SearchError::Closed`].
    async fn close(&self) {}
}

/// Build the backend selected in config.
pub fn backend_from_config(
    kind: BackendKind,
    config: &SauceNaoConfig,
) -> Result<Arc<dyn SearchBackend>> {
    Ok(match kind {
        BackendKind::Api => Arc::new(SauceNaoApi::from_config(config)?),
        BackendKind::Html => Arc::new(SauceNaoHtml::from_config(config)?),
    })
}

fn build_client(config: &SauceNaoConfig) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| SearchError::transport("failed to build HTTP client", e))
}
