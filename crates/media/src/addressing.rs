//! Deterministic source/target paths for staged media.
//!
//! A request `(chat 42, message 7, index 0, user "alice", photo)` stages to
//! `<input>/42.7.000.alice.jpg` and is annotated into
//! `<output>/42.7.000.alice.<suffix>.jpg`. The mapping is a pure function of
//! the identifying fields, so reprocessing a request overwrites its own files
//! and concurrent sessions never collide.

use std::path::{Path, PathBuf};

use projectp_common::MediaRequest;

/// Stand-in for users without a Telegram username.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Source and target paths of one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagedFile {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
}

/// Directory layout and naming convention for staged media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    input_dir: PathBuf,
    output_dir: PathBuf,
    target_suffix: String,
}

impl StagingLayout {
    #[must_use]
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        target_suffix: impl Into<String>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            target_suffix: target_suffix.into(),
        }
    }

    #[must_use]
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn target_suffix(&self) -> &str {
        &self.target_suffix
    }

    /// Resolve the staged paths for a request. Never fails.
    #[must_use]
    pub fn resolve(&self, request: &MediaRequest) -> StagedFile {
        let ext = request.media_kind.extension();
        let stem = format!(
            "{}.{}.{:03}.{}",
            request.chat_id,
            request.message_id,
            request.sequence_index,
            sanitize_user_name(request.user_name.as_deref()),
        );

        StagedFile {
            source_path: self.input_dir.join(format!("{stem}.{ext}")),
            target_path: self
                .output_dir
                .join(format!("{stem}.{}.{ext}", self.target_suffix)),
        }
    }
}

/// Map a possibly missing username onto a single safe path component.
///
/// Telegram usernames are `[A-Za-z0-9_]`, so real names pass through
/// unchanged. Anything else (dots, separators, unicode) becomes `_`.
#[must_use]
pub fn sanitize_user_name(user_name: Option<&str>) -> String {
    match user_name.map(str::trim) {
        Some(name) if !name.is_empty() => name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
        _ => ANONYMOUS_USER.to_string(),
    }
}
