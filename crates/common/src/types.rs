use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Kind of attachment a user submitted for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }

    /// File extension used for staged and annotated files.
    ///
    /// Telegram re-encodes photos as JPEG and videos as MP4.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Photo => "jpg",
            Self::Video => "mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photo" | "image" => Ok(Self::Photo),
            "video" => Ok(Self::Video),
            other => Err(Error::UnknownMediaKind(other.to_string())),
        }
    }
}

/// One attachment waiting to be processed.
///
/// `chat_id`, `message_id`, `sequence_index`, `user_name` and `media_kind`
/// identify the request; `file_id` and `file_size` only describe how to fetch
/// the bytes from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    pub chat_id: i64,
    pub message_id: i32,
    /// Position of the attachment within its message.
    pub sequence_index: u32,
    pub user_name: Option<String>,
    pub media_kind: MediaKind,
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u32>,
}

/// One detected object.
///
/// `frame` is the zero-based frame the box was found in; photos only have
/// frame 0. Coordinates are pixels in the source media.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub frame: u32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub class_id: u32,
}
