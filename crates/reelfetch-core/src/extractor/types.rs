//! Payload and envelope types shared by strategies, dispatcher and delivery.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw strategy output: file content plus best-effort metadata
#[derive(Debug, Clone, Default)]
pub struct RawPayload {
    /// Downloaded file content
    pub content: Bytes,
    /// Canonical page URL of the media
    pub url: String,
    /// Post caption or description
    pub caption: Option<String>,
    /// Media title
    pub title: Option<String>,
    /// Uploader or channel name
    pub author: Option<String>,
    /// Strategy determined the media is a video
    pub is_video: bool,
    /// Strategy determined the media is an image
    pub is_image: bool,
    /// File extension of the downloaded file, without the dot
    pub extension: Option<String>,
}

impl RawPayload {
    /// Create a payload with no metadata or kind flags
    #[must_use]
    pub fn new(content: impl Into<Bytes>, url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Canonical media kind understood by the delivery layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image (JPEG, PNG, GIF)
    Photo,
    /// Anything else
    Video,
}

impl MediaKind {
    /// Wire name of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance attached to every envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    /// Source page URL
    pub url: String,
    /// Uploader, empty when unknown
    pub author: String,
    /// When the strategy succeeded
    pub timestamp: DateTime<Utc>,
    /// Name of the strategy that produced the payload
    pub strategy: String,
}

/// Normalized, transport-ready media item
#[derive(Debug, Clone)]
pub struct MediaEnvelope {
    /// Photo or video
    pub kind: MediaKind,
    /// Binary content
    pub data: Bytes,
    /// Caption, not yet truncated to the transport limit
    pub caption: String,
    /// Provenance
    pub metadata: EnvelopeMetadata,
}

/// Successful dispatch: which strategy won, its payload and when
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Winning strategy name
    pub strategy: String,
    /// Raw payload returned by the strategy
    pub payload: RawPayload,
    /// Time of success
    pub timestamp: DateTime<Utc>,
}
