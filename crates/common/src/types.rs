//! Chat message segments as delivered by the host platform.

use serde::{Deserialize, Serialize};

/// One element of a chat message's ordered content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageSegment {
    Plain {
        text: String,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Base64 image data, possibly carrying a `data:image/...;base64,` prefix.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base64: Option<String>,
    },
    At {
        target: String,
    },
    /// Any segment kind this crate does not inspect (faces, voice, files...).
    #[serde(other)]
    Other,
}

impl MessageSegment {
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    /// Image segment carrying inline base64 data.
    #[must_use]
    pub fn image_base64(base64: impl Into<String>) -> Self {
        Self::Image {
            image_id: None,
            url: None,
            base64: Some(base64.into()),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// Ordered sequence of message segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageChain(Vec<MessageSegment>);

impl MessageChain {
    pub fn new(segments: Vec<MessageSegment>) -> Self {
        Self(segments)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessageSegment> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<MessageSegment>> for MessageChain {
    fn from(segments: Vec<MessageSegment>) -> Self {
        Self(segments)
    }
}

impl<'a> IntoIterator for &'a MessageChain {
    type IntoIter = std::slice::Iter<'a, MessageSegment>;
    type Item = &'a MessageSegment;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
