//! Download, detect and reply for one attachment at a time.

use std::{path::PathBuf, sync::Arc};

use {
    projectp_common::MediaRequest,
    projectp_detect::{DetectionJob, GatedDetector},
    projectp_media::{ResponseSummary, StagingLayout, stats},
    tracing::{debug, info, warn},
};

use crate::{
    conversation::{FAILURE_TEXT, nothing_to_show},
    error::{Result, TransferError},
    outbound::DEFAULT_MAX_ATTACHMENT_BYTES,
    transport::{MediaTransport, ReplyKeyboard},
};

pub const DEFAULT_PERCENTILE: f64 = 95.0;

/// What was sent back for a processed attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The annotated file was uploaded with the summary as caption.
    Annotated {
        summary: ResponseSummary,
        target_path: PathBuf,
    },
    /// Nothing was detected; a text-only reply was sent.
    NothingToShow { summary: ResponseSummary },
}

impl Outcome {
    #[must_use]
    pub fn summary(&self) -> &ResponseSummary {
        match self {
            Self::Annotated { summary, .. } | Self::NothingToShow { summary } => summary,
        }
    }
}

pub struct MediaPipeline {
    layout: StagingLayout,
    detector: GatedDetector,
    transport: Arc<dyn MediaTransport>,
    percentile: f64,
    reply_to_message: bool,
    max_attachment_bytes: u64,
}

impl MediaPipeline {
    #[must_use]
    pub fn new(
        layout: StagingLayout,
        detector: GatedDetector,
        transport: Arc<dyn MediaTransport>,
    ) -> Self {
        Self {
            layout,
            detector,
            transport,
            percentile: DEFAULT_PERCENTILE,
            reply_to_message: true,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    #[must_use]
    pub fn with_percentile(mut self, percentile: f64) -> Self {
        self.percentile = percentile;
        self
    }

    /// Whether replies quote the message that carried the attachment.
    #[must_use]
    pub fn with_reply_to_message(mut self, enabled: bool) -> Self {
        self.reply_to_message = enabled;
        self
    }

    /// Attachments Telegram announces as larger than this are refused before
    /// any download starts.
    #[must_use]
    pub fn with_max_attachment_bytes(mut self, limit: u64) -> Self {
        self.max_attachment_bytes = limit;
        self
    }

    #[must_use]
    pub fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    fn reply_to(&self, request: &MediaRequest) -> Option<i32> {
        self.reply_to_message.then_some(request.message_id)
    }

    /// Handle a single attachment end to end.
    ///
    /// Only the detector call runs under the admission gate; download and
    /// upload overlap freely with other requests.
    pub async fn process(&self, request: &MediaRequest) -> Result<Outcome> {
        if let Some(size) = request
            .file_size
            .map(u64::from)
            .filter(|size| *size > self.max_attachment_bytes)
        {
            return Err(TransferError::TooLarge {
                size,
                limit: self.max_attachment_bytes,
            }
            .into());
        }
        let staged = self.layout.resolve(request);

        let bytes = self
            .transport
            .download(&request.file_id, &staged.source_path)
            .await?;
        info!(
            chat_id = request.chat_id,
            message_id = request.message_id,
            user = request.user_name.as_deref().unwrap_or("-"),
            kind = %request.media_kind,
            file = %staged.source_path.display(),
            bytes,
            "media staged"
        );

        let job = DetectionJob {
            source_path: staged.source_path.clone(),
            output_dir: self.layout.output_dir().to_path_buf(),
            target_suffix: self.layout.target_suffix().to_string(),
            media_kind: request.media_kind,
        };
        let detection = self.detector.process(&job).await?;
        let total = detection
            .total_seconds()
            .ok_or(projectp_detect::Error::MissingTotal)?;

        let objects = stats::round_count(stats::percentile(
            &detection.boxes,
            detection.frame_count,
            self.percentile,
        ));
        let summary = ResponseSummary::new(objects, total, request.media_kind);
        let reply_to = self.reply_to(request);

        if detection.is_empty() {
            info!(
                chat_id = request.chat_id,
                message_id = request.message_id,
                file = %staged.source_path.display(),
                "no detections, replying with text only"
            );
            self.transport
                .reply_text(
                    request.chat_id,
                    &nothing_to_show(&summary),
                    reply_to,
                    ReplyKeyboard::Keep,
                )
                .await?;
            return Ok(Outcome::NothingToShow { summary });
        }

        self.transport
            .reply_media(
                request.chat_id,
                request.media_kind,
                &staged.target_path,
                &summary.to_string(),
                reply_to,
            )
            .await?;
        debug!(
            chat_id = request.chat_id,
            target = %staged.target_path.display(),
            objects,
            "annotated media sent"
        );
        Ok(Outcome::Annotated {
            summary,
            target_path: staged.target_path,
        })
    }

    /// Process every attachment of a message in attachment order.
    ///
    /// A failed attachment is reported to the user and does not stop the
    /// ones after it.
    pub async fn process_all(&self, requests: &[MediaRequest]) -> Vec<Result<Outcome>> {
        let mut ordered: Vec<&MediaRequest> = requests.iter().collect();
        ordered.sort_by_key(|r| r.sequence_index);

        let mut outcomes = Vec::with_capacity(ordered.len());
        for request in ordered {
            let outcome = self.process(request).await;
            if let Err(e) = &outcome {
                warn!(
                    chat_id = request.chat_id,
                    message_id = request.message_id,
                    sequence_index = request.sequence_index,
                    error = %e,
                    "media request failed"
                );
                if let Err(notify_err) = self
                    .transport
                    .reply_text(
                        request.chat_id,
                        FAILURE_TEXT,
                        self.reply_to(request),
                        ReplyKeyboard::Keep,
                    )
                    .await
                {
                    warn!(
                        chat_id = request.chat_id,
                        error = %notify_err,
                        "failed to send failure notice"
                    );
                }
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
