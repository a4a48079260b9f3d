//! SauceNAO search page backend.
//!
//! Posts the image the way the web form does and returns the HTML body for
//! [`crate::html_extract`] to pick apart. Holds no state besides the HTTP
//! client.

use {
    async_trait::async_trait,
    picsearch_config::{SauceNaoConfig, schema::DEFAULT_USER_AGENT},
    reqwest::{
        Client,
        header::USER_AGENT,
        multipart::{Form, Part},
    },
    tracing::debug,
};

use {
    super::{RawBackendResult, SearchBackend, build_client},
    crate::{
        error::{Result, SearchError},
        payload::ImagePayload,
    },
};

/// Scrapes the SauceNAO web search page.
#[derive(Debug, Clone)]
pub struct SauceNaoHtml {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl Default for SauceNaoHtml {
    fn default() -> Self {
        let defaults = SauceNaoConfig::default();
        Self {
            client: Client::new(),
            base_url: defaults.html_url,
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

impl SauceNaoHtml {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SauceNaoConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.html_url.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Multipart form matching the web UI: all indexes, nothing hidden,
    /// default frame layout.
    fn form(image: Vec<u8>) -> Form {
        Form::new()
            .part("file", Part::bytes(image).file_name("image.png"))
            .text("frame", "1")
            .text("hide", "0")
            .text("database", "999")
    }
}

#[async_trait]
impl SearchBackend for SauceNaoHtml {
    fn id(&self) -> &'static str {
        "saucenao-html"
    }

    fn name(&self) -> &'static str {
        "SauceNAO web search"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn search(&self, payload: &ImagePayload) -> Result<RawBackendResult> {
        let image = payload.decode()?;

        let response = self
            .client
            .post(&self.base_url)
            .header(USER_AGENT, &self.user_agent)
            .multipart(Self::form(image))
            .send()
            .await
            .map_err(|e| SearchError::transport("failed to send SauceNAO search request", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::transport("failed to read SauceNAO search page", e))?;
        debug!(bytes = body.len(), "SauceNAO search page received");
        Ok(RawBackendResult::Html(body))
    }
}
