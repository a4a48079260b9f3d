//! Image payload extraction from chat message segments.

use {
    base64::{
        Engine, alphabet,
        engine::{GeneralPurpose, GeneralPurposeConfig},
    },
    picsearch_common::types::MessageSegment,
};

use crate::error::Result;

const DATA_URI_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = "base64,";

/// Standard alphabet with padding. Non-zero trailing bits in the last symbol
/// are accepted.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Characters of the payload shown in logs.
const PREVIEW_CHARS: usize = 30;

/// Base64 image data with any `data:image/<fmt>;base64,` prefix removed.
///
/// Not yet decoded; [`ImagePayload::decode`] is where malformed data is
/// detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload(String);

impl ImagePayload {
    /// Extract the payload of an image segment.
    ///
    /// Returns `None` for non-image segments and for image segments without
    /// inline data.
    pub fn from_segment(segment: &MessageSegment) -> Option<Self> {
        match segment {
            MessageSegment::Image {
                base64: Some(raw), ..
            } => Self::new(raw),
            _ => None,
        }
    }

    /// Normalize a raw base64 string. Returns `None` when nothing is left
    /// after stripping the data URI prefix.
    pub fn new(raw: &str) -> Option<Self> {
        let stripped = strip_data_uri(raw.trim());
        (!stripped.is_empty()).then(|| Self(stripped.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First few characters, for log lines.
    pub fn preview(&self) -> &str {
        match self.0.char_indices().nth(PREVIEW_CHARS) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// Decode to raw image bytes. Embedded line breaks are ignored.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let compact: String = self
            .0
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        Ok(LENIENT.decode(compact)?)
    }
}

/// Strip a leading `data:image/<format>;base64,` tag, whatever the format.
///
/// Strings without a well-formed tag are returned unchanged.
pub fn strip_data_uri(raw: &str) -> &str {
    raw.strip_prefix(DATA_URI_PREFIX)
        .and_then(|rest| {
            let (format, tail) = rest.split_once(';')?;
            if format.is_empty() {
                return None;
            }
            tail.strip_prefix(BASE64_MARKER)
        })
        .unwrap_or(raw)
}
