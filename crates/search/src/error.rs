use std::error::Error as StdError;

use crate::{html_extract::NO_MATCH_INFO, record::NO_RESULT};

/// Reply sent when the base64 payload cannot be decoded.
pub const DECODE_FAILED: &str = "Base64 解码失败，请稍后再试。";

/// Reply sent for transport and backend failures.
pub const SEARCH_FAILED: &str = "图片搜索失败,请稍后再试。";

/// Everything that can stop a search from producing a match summary.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The image payload is not valid base64.
    #[error("base64 decoding failed: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The request never produced a usable response.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The API answered, but reported an error.
    #[error("search backend error: {message}")]
    Backend { message: String },

    /// The search page answered with a non-success HTTP status.
    #[error("search page returned HTTP {status}")]
    Status { status: u16 },

    /// The backend has been shut down.
    #[error("search backend is closed")]
    Closed,

    /// The API returned an empty result list.
    #[error("no results")]
    NoResults,

    /// The search page contains no result block.
    #[error("no result block in search page")]
    NoResultBlock,

    /// The search page could not be parsed.
    #[error("failed to parse search page: {message}")]
    Parse { message: String },
}

impl SearchError {
    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// The backend was reachable but had nothing to report. Not an error
    /// from the operator's point of view.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::NoResults | Self::NoResultBlock)
    }

    /// Text sent back to the chat for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Decode(_) => DECODE_FAILED.into(),
            Self::Status { status } => format!("搜索请求失败，状态码：{status}"),
            Self::NoResults => NO_RESULT.into(),
            Self::NoResultBlock => NO_MATCH_INFO.into(),
            Self::Transport { .. } | Self::Backend { .. } | Self::Closed | Self::Parse { .. } => {
                SEARCH_FAILED.into()
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
