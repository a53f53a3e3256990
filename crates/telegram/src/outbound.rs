use std::{future::Future, path::Path, time::Duration};

use {
    async_trait::async_trait,
    projectp_common::MediaKind,
    teloxide::{
        RequestError,
        net::Download,
        payloads::{SendMessageSetters, SendPhotoSetters, SendVideoSetters},
        prelude::*,
        types::{
            InputFile, KeyboardButton, KeyboardMarkup, KeyboardRemove, MessageId, ReplyMarkup,
            ReplyParameters,
        },
    },
    tokio::io::AsyncWriteExt,
    tracing::{debug, info, warn},
};

use crate::{
    conversation::{KEYBOARD_OK, KEYBOARD_PLACEHOLDER},
    error::TransferError,
    transport::{MediaTransport, ReplyKeyboard},
};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Bot API download limit for bots.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 20 * 1024 * 1024;

/// [`MediaTransport`] over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    max_attachment_bytes: u64,
}

impl TelegramTransport {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_attachment_bytes(mut self, limit: u64) -> Self {
        self.max_attachment_bytes = limit;
        self
    }

    async fn run_telegram_request_with_retry<T, F, Fut>(
        &self,
        chat_id: Option<i64>,
        operation: &'static str,
        mut request: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id,
                            operation,
                            retries,
                            max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl MediaTransport for TelegramTransport {
    async fn download(&self, file_id: &str, dest: &Path) -> Result<u64, TransferError> {
        let file = self
            .run_telegram_request_with_retry(None, "get file", || {
                let req = self.bot.get_file(file_id);
                async move { req.await }
            })
            .await?;

        let size = u64::from(file.size);
        if size > self.max_attachment_bytes {
            return Err(TransferError::TooLarge {
                size,
                limit: self.max_attachment_bytes,
            });
        }

        let mut dst = tokio::fs::File::create(dest)
            .await
            .map_err(|e| TransferError::file(dest, e))?;
        self.bot.download_file(&file.path, &mut dst).await?;
        dst.flush().await.map_err(|e| TransferError::file(dest, e))?;

        debug!(
            file_id,
            telegram_path = %file.path,
            dest = %dest.display(),
            size,
            "telegram file downloaded"
        );
        Ok(size)
    }

    async fn reply_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
        keyboard: ReplyKeyboard,
    ) -> Result<(), TransferError> {
        let chat = ChatId(chat_id);
        self.run_telegram_request_with_retry(Some(chat_id), "send message", || {
            let mut req = self.bot.send_message(chat, text);
            if let Some(params) = reply_params(reply_to) {
                req = req.reply_parameters(params);
            }
            if let Some(markup) = reply_markup(keyboard) {
                req = req.reply_markup(markup);
            }
            async move { req.await }
        })
        .await?;

        info!(
            chat_id,
            reply_to = ?reply_to,
            text_len = text.len(),
            "telegram outbound text sent"
        );
        Ok(())
    }

    async fn reply_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        path: &Path,
        caption: &str,
        reply_to: Option<i32>,
    ) -> Result<(), TransferError> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| TransferError::file(path, e))?
        {
            return Err(TransferError::file(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "annotated file missing"),
            ));
        }

        let chat = ChatId(chat_id);
        match kind {
            MediaKind::Photo => {
                self.run_telegram_request_with_retry(Some(chat_id), "send photo", || {
                    let mut req = self
                        .bot
                        .send_photo(chat, InputFile::file(path))
                        .caption(caption);
                    if let Some(params) = reply_params(reply_to) {
                        req = req.reply_parameters(params);
                    }
                    async move { req.await }
                })
                .await?;
            },
            MediaKind::Video => {
                self.run_telegram_request_with_retry(Some(chat_id), "send video", || {
                    let mut req = self
                        .bot
                        .send_video(chat, InputFile::file(path))
                        .caption(caption);
                    if let Some(params) = reply_params(reply_to) {
                        req = req.reply_parameters(params);
                    }
                    async move { req.await }
                })
                .await?;
            },
        }

        info!(
            chat_id,
            reply_to = ?reply_to,
            kind = %kind,
            path = %path.display(),
            caption_len = caption.len(),
            "telegram outbound media sent"
        );
        Ok(())
    }
}

fn reply_params(reply_to: Option<i32>) -> Option<ReplyParameters> {
    reply_to.map(|id| ReplyParameters::new(MessageId(id)).allow_sending_without_reply())
}

fn reply_markup(keyboard: ReplyKeyboard) -> Option<ReplyMarkup> {
    match keyboard {
        ReplyKeyboard::Keep => None,
        ReplyKeyboard::MediaPrompt => Some(ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![vec![KeyboardButton::new(KEYBOARD_OK)]])
                .one_time_keyboard()
                .input_field_placeholder(KEYBOARD_PLACEHOLDER),
        )),
        ReplyKeyboard::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}
