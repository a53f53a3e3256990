use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPConfig {
    pub telegram: TelegramConfig,
    pub staging: StagingConfig,
    pub detector: DetectorConfig,
}

/// Telegram bot settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_redacted")]
    pub token: Secret<String>,

    /// Thread replies to the message that carried the attachment.
    pub reply_to_message: bool,

    /// Long-polling timeout passed to `getUpdates` (seconds).
    pub poll_timeout_secs: u32,

    /// Largest attachment accepted for download (MiB). The Bot API refuses
    /// downloads above 20 MiB.
    pub max_attachment_mib: u32,
}

impl TelegramConfig {
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("reply_to_message", &self.reply_to_message)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("max_attachment_mib", &self.max_attachment_mib)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            reply_to_message: true,
            poll_timeout_secs: 30,
            max_attachment_mib: 20,
        }
    }
}

fn serialize_redacted<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if secret.expose_secret().is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("[REDACTED]")
    }
}

/// Where uploads are staged and annotated results are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Token inserted before the extension of annotated files.
    pub target_suffix: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            target_suffix: "output".into(),
        }
    }
}

/// External detector executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Explicit path to the detector binary. Falls back to `binary_name` on `$PATH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<String>,
    pub binary_name: String,
    /// Model file handed to the detector with `--model`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    /// Extra arguments placed before the generated ones.
    pub args: Vec<String>,
    /// Percentile of per-frame detection counts reported to users.
    pub percentile: f64,
    /// Upper bound for a single detector run (seconds).
    pub timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            binary_name: "projectp-infer".into(),
            model_path: None,
            args: Vec::new(),
            percentile: 95.0,
            timeout_secs: 600,
        }
    }
}
