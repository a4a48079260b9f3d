use std::sync::Arc;

use tracing::{error, info};

use crate::{backend::SearchBackend, payload::ImagePayload};

/// Outcome of one search. Either way the text is a complete chat reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchReply {
    Found(String),
    Failed(String),
}

impl SearchReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Found(text) | Self::Failed(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Found(text) | Self::Failed(text) => text,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Runs payload → backend → normalizer → formatter.
#[derive(Clone)]
pub struct ImageSearcher {
    backend: Arc<dyn SearchBackend>,
}

impl ImageSearcher {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    /// Search once. Never fails: errors become their user-facing text.
    pub async fn search(&self, payload: &ImagePayload) -> SearchReply {
        info!(
            backend = self.backend.id(),
            image = %payload.preview(),
            "searching image"
        );

        let summary = match self.backend.search(payload).await {
            Ok(raw) => raw.summarize(),
            Err(e) => Err(e),
        };

        match summary {
            Ok(text) => SearchReply::Found(text),
            Err(e) if e.is_empty_result() => {
                info!(backend = self.backend.id(), "no match found");
                SearchReply::Failed(e.user_message())
            },
            Err(e) => {
                error!(backend = self.backend.id(), error = %e, "image search failed");
                SearchReply::Failed(e.user_message())
            },
        }
    }
}

impl std::fmt::Debug for ImageSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSearcher")
            .field("backend", &self.backend.id())
            .finish()
    }
}
