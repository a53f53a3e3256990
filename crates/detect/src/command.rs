//! Detector backed by an external inference executable.
//!
//! The executable is invoked once per job:
//!
//! ```text
//! <binary> [args..] [--model <model>] --source <path> --output-dir <dir> \
//!     --suffix <suffix> --kind <photo|video>
//! ```
//!
//! It writes the annotated file as `<stem>.<suffix>.<ext>` inside the output
//! directory and prints a single JSON document on stdout:
//!
//! ```json
//! {"boxes": [{"frame": 0, "x1": 1, "y1": 2, "x2": 3, "y2": 4}], "timings": {"total": 0.42}, "frames": 1}
//! ```

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use {
    async_trait::async_trait,
    tokio::process::Command,
    tracing::{debug, info},
};

use crate::{DetectionJob, DetectionResult, Detector, Error, Result};

/// Default executable name looked up in `PATH`.
pub const DEFAULT_BINARY_NAME: &str = "projectp-infer";

/// Default wall-clock limit for a single detection.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

const STDERR_LIMIT: usize = 2000;

#[derive(Clone, Debug)]
pub struct CommandDetector {
    binary_path: Option<String>,
    binary_name: String,
    model_path: Option<String>,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for CommandDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY_NAME)
    }
}

impl CommandDetector {
    #[must_use]
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_path: None,
            binary_name: binary_name.into(),
            model_path: None,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Explicit executable location, checked before `PATH`.
    #[must_use]
    pub fn with_binary_path(mut self, path: Option<String>) -> Self {
        self.binary_path = path;
        self
    }

    #[must_use]
    pub fn with_model_path(mut self, path: Option<String>) -> Self {
        self.model_path = path;
        self
    }

    /// Extra arguments placed before the generated ones.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the executable: configured path first, then `PATH`.
    pub fn find_binary(&self) -> Option<PathBuf> {
        if let Some(path) = self.binary_path.as_deref().map(expand_tilde)
            && path.is_file()
        {
            return Some(path);
        }
        which::which(&self.binary_name).ok()
    }

    /// Whether the executable can be located.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.find_binary().is_some()
    }

    fn build_command(&self, binary: &Path, job: &DetectionJob) -> Command {
        let mut cmd = Command::new(binary);
        cmd.args(&self.args);
        if let Some(model) = &self.model_path {
            cmd.arg("--model").arg(expand_tilde(model));
        }
        cmd.arg("--source").arg(&job.source_path);
        cmd.arg("--output-dir").arg(&job.output_dir);
        cmd.arg("--suffix").arg(&job.target_suffix);
        cmd.arg("--kind").arg(job.media_kind.as_str());

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Detector for CommandDetector {
    fn id(&self) -> &'static str {
        "command"
    }

    async fn process(&self, job: &DetectionJob) -> Result<DetectionResult> {
        let binary = self.find_binary().ok_or_else(|| Error::BinaryNotFound {
            name: self
                .binary_path
                .clone()
                .unwrap_or_else(|| self.binary_name.clone()),
        })?;

        debug!(
            binary = %binary.display(),
            source = %job.source_path.display(),
            kind = %job.media_kind,
            "starting detector"
        );
        let started = Instant::now();

        let child = self
            .build_command(&binary, job)
            .spawn()
            .map_err(|e| Error::external(format!("failed to start {}", binary.display()), e))?;

        // Dropping the `wait_with_output` future on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
            .map_err(|e| Error::external("failed to collect detector output", e))?;

        if !output.status.success() {
            return Err(Error::Failed {
                status: output.status.to_string(),
                stderr: truncate(String::from_utf8_lossy(&output.stderr).trim()),
            });
        }

        let result: DetectionResult = serde_json::from_slice(&output.stdout)?;
        let total = result.total_seconds().ok_or(Error::MissingTotal)?;

        info!(
            source = %job.source_path.display(),
            boxes = result.boxes.len(),
            frames = result.frame_count,
            total_secs = total,
            wall_ms = started.elapsed().as_millis() as u64,
            "detection finished"
        );
        Ok(result)
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(dirs) = directories::BaseDirs::new()
    {
        return dirs.home_dir().join(stripped);
    }
    PathBuf::from(path)
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(STDERR_LIMIT) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use {super::*, projectp_common::MediaKind, tempfile::TempDir};

    /// Run `script` through `/bin/sh` so the test never has to exec a file it
    /// has just written.
    fn shell_detector(dir: &TempDir, script: &str) -> CommandDetector {
        let path = dir.path().join("detector.sh");
        std::fs::write(&path, script).unwrap();
        CommandDetector::new("projectp-infer-test-missing")
            .with_binary_path(Some("/bin/sh".into()))
            .with_args(vec![path.display().to_string()])
    }

    fn job(dir: &TempDir, kind: MediaKind) -> DetectionJob {
        DetectionJob {
            source_path: dir.path().join(format!("1.2.000.alice.{}", kind.extension())),
            output_dir: dir.path().join("out"),
            target_suffix: "output".into(),
            media_kind: kind,
        }
    }

    #[tokio::test]
    async fn parses_stdout_and_passes_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args.txt");
        let script = format!(
            "echo \"$@\" > '{}'\n\
             echo '{{\"boxes\":[{{\"frame\":0,\"x1\":0,\"y1\":0,\"x2\":5,\"y2\":5}}],\"timings\":{{\"total\":0.5}}}}'\n",
            args_file.display()
        );
        let detector = shell_detector(&dir, &script).with_model_path(Some("weights.onnx".into()));
        let job = job(&dir, MediaKind::Video);

        let result = detector.process(&job).await.unwrap();
        assert_eq!(result.boxes.len(), 1);
        assert_eq!(result.total_seconds(), Some(0.5));

        let args = std::fs::read_to_string(&args_file).unwrap();
        let expected = format!(
            "--model weights.onnx --source {} --output-dir {} --suffix output --kind video",
            job.source_path.display(),
            job.output_dir.display()
        );
        assert_eq!(args.trim(), expected);
    }

    #[tokio::test]
    async fn empty_detection_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let detector = shell_detector(&dir, "echo '{\"boxes\":[],\"timings\":{\"total\":1.0}}'\n");
        let result = detector.process(&job(&dir, MediaKind::Photo)).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let detector = shell_detector(&dir, "echo 'model exploded' >&2\nexit 3\n");
        let err = detector
            .process(&job(&dir, MediaKind::Photo))
            .await
            .unwrap_err();
        match err {
            Error::Failed { stderr, .. } => assert_eq!(stderr, "model exploded"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_total_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let detector = shell_detector(&dir, "echo '{\"boxes\":[],\"timings\":{\"nms\":0.1}}'\n");
        let err = detector
            .process(&job(&dir, MediaKind::Photo))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingTotal));
    }

    #[tokio::test]
    async fn garbage_stdout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let detector = shell_detector(&dir, "echo 'loading model...'\n");
        let err = detector
            .process(&job(&dir, MediaKind::Photo))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOutput(_)));
    }

    #[tokio::test]
    async fn slow_detector_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let detector =
            shell_detector(&dir, "sleep 5\n").with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let err = detector
            .process(&job(&dir, MediaKind::Photo))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let detector = CommandDetector::new("projectp-infer-definitely-not-installed");
        assert!(!detector.is_available());
        let dir = tempfile::tempdir().unwrap();
        let err = detector
            .process(&job(&dir, MediaKind::Photo))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BinaryNotFound { .. }));
    }

    #[test]
    fn tilde_paths_are_expanded() {
        assert_eq!(expand_tilde("/opt/model.onnx"), PathBuf::from("/opt/model.onnx"));
        if let Some(dirs) = directories::BaseDirs::new() {
            assert_eq!(expand_tilde("~/model.onnx"), dirs.home_dir().join("model.onnx"));
        }
    }

    #[test]
    fn long_stderr_is_truncated() {
        let long = "x".repeat(STDERR_LIMIT + 10);
        assert_eq!(truncate(&long).chars().count(), STDERR_LIMIT + 1);
        assert_eq!(truncate("short"), "short");
    }
}
