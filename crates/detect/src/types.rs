use std::{collections::BTreeMap, path::PathBuf};

use {
    async_trait::async_trait,
    projectp_common::{BoundingBox, MediaKind},
    serde::{Deserialize, Serialize},
};

use crate::Result;

/// Timing key every detector must report.
pub const TOTAL_TIMING: &str = "total";

/// Input of one detector invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionJob {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    /// Token the detector inserts before the extension of the annotated file.
    pub target_suffix: String,
    pub media_kind: MediaKind,
}

/// Output of one detector invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Detected objects in frame order. Empty when nothing was found.
    #[serde(default)]
    pub boxes: Vec<BoundingBox>,
    /// Seconds spent per stage; contains [`TOTAL_TIMING`].
    #[serde(default, rename = "timings")]
    pub stage_timings: BTreeMap<String, f64>,
    /// Number of frames the detector looked at, when it reports one.
    #[serde(default, rename = "frames", skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u32>,
}

impl DetectionResult {
    /// Wall time of the whole detection, in seconds.
    #[must_use]
    pub fn total_seconds(&self) -> Option<f64> {
        self.stage_timings.get(TOTAL_TIMING).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Object detector.
///
/// Implementations must tolerate repeated calls but are never called
/// concurrently when reached through [`crate::GatedDetector`].
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detector identifier (e.g. "command").
    fn id(&self) -> &'static str;

    /// Run detection on `job.source_path`, writing the annotated file into
    /// `job.output_dir`.
    async fn process(&self, job: &DetectionJob) -> Result<DetectionResult>;
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detector_json() {
        let json = r#"{
            "boxes": [
                {"frame": 0, "x1": 1, "y1": 2, "x2": 30, "y2": 40, "confidence": 0.8, "class_id": 0},
                {"frame": 3, "x1": 5, "y1": 5, "x2": 9, "y2": 9}
            ],
            "timings": {"preprocess": 0.1, "inference": 0.9, "total": 1.234},
            "frames": 4
        }"#;
        let result: DetectionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.boxes.len(), 2);
        assert_eq!(result.boxes[1].frame, 3);
        assert_eq!(result.total_seconds(), Some(1.234));
        assert_eq!(result.frame_count, Some(4));
        assert!(!result.is_empty());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let result: DetectionResult = serde_json::from_str("{}").unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total_seconds(), None);
        assert_eq!(result.frame_count, None);
    }
}
