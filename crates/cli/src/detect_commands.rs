use std::path::{Path, PathBuf};

use {
    anyhow::{Result, bail},
    projectp_common::MediaKind,
    projectp_config::ProjectPConfig,
    projectp_detect::DetectionJob,
    projectp_media::{ResponseSummary, stats},
    tracing::debug,
};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm", "m4v"];

/// Run one local file through the same gated detector the bot uses and
/// print what the bot would have replied.
pub async fn run_detect(config: ProjectPConfig, path: &Path, video: bool) -> Result<()> {
    projectp_config::validate(&config, false)?;
    if !path.is_file() {
        bail!("{} is not a file", path.display());
    }

    let layout = crate::staging_layout(&config);
    projectp_media::prepare_directories(&layout).await?;

    let media_kind = media_kind_for(path, video);
    let job = DetectionJob {
        source_path: path.to_path_buf(),
        output_dir: layout.output_dir().to_path_buf(),
        target_suffix: layout.target_suffix().to_string(),
        media_kind,
    };
    debug!(?job, "running one-shot detection");

    let detector = crate::gated_detector(&config);
    let result = detector.process(&job).await?;
    let total = result
        .total_seconds()
        .ok_or(projectp_detect::Error::MissingTotal)?;

    let objects = stats::round_count(stats::percentile(
        &result.boxes,
        result.frame_count,
        config.detector.percentile,
    ));
    let summary = ResponseSummary::new(objects, total, media_kind);

    if result.is_empty() {
        println!("Nothing to show. {summary}");
    } else {
        println!("{summary}");
        println!(
            "annotated: {}",
            annotated_path(layout.output_dir(), path, layout.target_suffix(), media_kind)
                .display()
        );
    }
    Ok(())
}

fn media_kind_for(path: &Path, video: bool) -> MediaKind {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    if video || by_extension {
        MediaKind::Video
    } else {
        MediaKind::Photo
    }
}

/// Where the detector writes its annotated copy of `source`.
fn annotated_path(output_dir: &Path, source: &Path, suffix: &str, kind: MediaKind) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{stem}.{suffix}.{}", kind.extension()))
}
