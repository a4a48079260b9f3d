//! Reverse image search against SauceNAO.
//!
//! An [`ImagePayload`] pulled from a chat message goes through a
//! [`SearchBackend`] (JSON API or scraped search page), and the raw result is
//! normalized into a single reply string. Every failure is turned into a
//! user-facing [`SearchReply::Failed`] by the [`ImageSearcher`].

pub mod backend;
pub mod error;
pub mod format;
pub mod html_extract;
pub mod payload;
pub mod record;
pub mod searcher;

pub use {
    backend::{RawBackendResult, SauceNaoApi, SauceNaoHtml, SearchBackend, backend_from_config},
    error::{Result, SearchError},
    payload::ImagePayload,
    record::SearchResultRecord,
    searcher::{ImageSearcher, SearchReply},
};
