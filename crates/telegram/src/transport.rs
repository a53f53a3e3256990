use std::path::Path;

use {async_trait::async_trait, projectp_common::MediaKind};

use crate::error::TransferError;

/// Reply keyboard attached to a text reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyKeyboard {
    /// Leave whatever keyboard the client shows.
    #[default]
    Keep,
    /// One-time `Ok` keyboard prompting for a photo or video.
    MediaPrompt,
    /// Hide the custom keyboard.
    Remove,
}

/// What the bot needs from a messaging platform.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Fetch an attachment into `dest`, returning the number of bytes written.
    async fn download(&self, file_id: &str, dest: &Path) -> Result<u64, TransferError>;

    async fn reply_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
        keyboard: ReplyKeyboard,
    ) -> Result<(), TransferError>;

    /// Upload the file at `path` as a photo or video with `caption`.
    async fn reply_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        path: &Path,
        caption: &str,
        reply_to: Option<i32>,
    ) -> Result<(), TransferError>;
}
