//! In-memory transport and detector used by the unit tests.

#![allow(clippy::unwrap_used)]

use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    projectp_common::{BoundingBox, MediaKind, MediaRequest},
    projectp_detect::{DetectionJob, DetectionResult, Detector},
};

use crate::{
    error::TransferError,
    transport::{MediaTransport, ReplyKeyboard},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        reply_to: Option<i32>,
        keyboard: ReplyKeyboard,
    },
    Media {
        chat_id: i64,
        kind: MediaKind,
        path: PathBuf,
        caption: String,
        reply_to: Option<i32>,
    },
}

#[derive(Default)]
pub struct FakeTransport {
    downloads: Mutex<Vec<(String, PathBuf)>>,
    sent: Mutex<Vec<Sent>>,
    failing_downloads: HashSet<String>,
}

impl FakeTransport {
    pub fn failing_download(mut self, file_id: &str) -> Self {
        self.failing_downloads.insert(file_id.to_string());
        self
    }

    pub fn downloads(&self) -> Vec<(String, PathBuf)> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| match s {
                Sent::Text { chat_id: id, .. } | Sent::Media { chat_id: id, .. } => *id == chat_id,
            })
            .collect()
    }
}

#[async_trait]
impl MediaTransport for FakeTransport {
    async fn download(&self, file_id: &str, dest: &Path) -> Result<u64, TransferError> {
        if self.failing_downloads.contains(file_id) {
            return Err(TransferError::file(
                dest,
                std::io::Error::other("connection reset"),
            ));
        }
        self.downloads
            .lock()
            .unwrap()
            .push((file_id.to_string(), dest.to_path_buf()));
        Ok(4)
    }

    async fn reply_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
        keyboard: ReplyKeyboard,
    ) -> Result<(), TransferError> {
        self.sent.lock().unwrap().push(Sent::Text {
            chat_id,
            text: text.to_string(),
            reply_to,
            keyboard,
        });
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
        self.sent.lock().unwrap().push(Sent::Media {
            chat_id,
            kind,
            path: path.to_path_buf(),
            caption: caption.to_string(),
            reply_to,
        });
        Ok(())
    }
}

/// Detector returning a fixed number of boxes on frame 0.
pub struct FakeDetector {
    boxes: usize,
    total: f64,
    delay: Duration,
    failing_source: Option<PathBuf>,
    calls: Arc<AtomicUsize>,
}

impl FakeDetector {
    pub fn boxes(boxes: usize, total: f64) -> Self {
        Self {
            boxes,
            total,
            delay: Duration::ZERO,
            failing_source: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, source: impl Into<PathBuf>) -> Self {
        self.failing_source = Some(source.into());
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Detector for FakeDetector {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn process(&self, job: &DetectionJob) -> projectp_detect::Result<DetectionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing_source.as_deref() == Some(job.source_path.as_path()) {
            return Err(projectp_detect::Error::Failed {
                status: "exit status: 1".into(),
                stderr: "model exploded".into(),
            });
        }
        let bbox = BoundingBox {
            frame: 0,
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            confidence: 0.9,
            class_id: 0,
        };
        Ok(DetectionResult {
            boxes: vec![bbox; self.boxes],
            stage_timings: BTreeMap::from([("total".to_string(), self.total)]),
            frame_count: Some(1),
        })
    }
}

fn request(
    chat_id: i64,
    message_id: i32,
    sequence_index: u32,
    media_kind: MediaKind,
) -> MediaRequest {
    MediaRequest {
        chat_id,
        message_id,
        sequence_index,
        user_name: Some("alice".into()),
        media_kind,
        file_id: format!("{media_kind}-{chat_id}-{message_id}-{sequence_index}"),
        file_size: Some(4),
    }
}

pub fn photo_request(chat_id: i64, message_id: i32, sequence_index: u32) -> MediaRequest {
    request(chat_id, message_id, sequence_index, MediaKind::Photo)
}

pub fn video_request(chat_id: i64, message_id: i32, sequence_index: u32) -> MediaRequest {
    request(chat_id, message_id, sequence_index, MediaKind::Video)
}
