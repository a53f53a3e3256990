//! Detection-count statistic reported to users.

use std::collections::BTreeMap;

use projectp_common::BoundingBox;

/// Per-frame detection counts of one result.
///
/// Only frames that carry a box are stored. The remaining frames up to
/// [`FrameCounts::frames`] count as zero, so a detector reporting a huge frame
/// index or frame total costs no more memory than its boxes do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCounts {
    per_frame: BTreeMap<u32, u32>,
    frames: u64,
}

impl FrameCounts {
    /// Number of frames, including those without detections.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Boxes on `frame`, zero for frames without detections.
    #[must_use]
    pub fn get(&self, frame: u32) -> u32 {
        self.per_frame.get(&frame).copied().unwrap_or(0)
    }

    /// Frames with at least one box.
    #[must_use]
    pub fn non_empty_frames(&self) -> usize {
        self.per_frame.len()
    }

    /// Count at position `rank` of the ascending sort of all frame counts.
    fn ranked(&self, sorted_non_zero: &[u32], rank: u64) -> u32 {
        let zeros = self.frames - sorted_non_zero.len() as u64;
        if rank < zeros {
            0
        } else {
            usize::try_from(rank - zeros)
                .ok()
                .and_then(|i| sorted_non_zero.get(i).copied())
                .unwrap_or(0)
        }
    }
}

/// Count detections per frame.
///
/// Frames run from 0 to the last frame that carries a box, or to
/// `frame_count - 1` when the engine reported how many frames it saw, so
/// frames without detections count as zero.
#[must_use]
pub fn frame_counts(boxes: &[BoundingBox], frame_count: Option<u32>) -> FrameCounts {
    let mut per_frame = BTreeMap::new();
    for b in boxes {
        *per_frame.entry(b.frame).or_insert(0u32) += 1;
    }
    let last_box_frame = per_frame
        .last_key_value()
        .map_or(0, |(frame, _)| u64::from(*frame) + 1);
    let frames = last_box_frame.max(u64::from(frame_count.unwrap_or(0)));
    FrameCounts { per_frame, frames }
}

/// `p`-th percentile (0..=100) of the per-frame detection counts, linearly
/// interpolated between the closest ranks.
///
/// Total over the empty sequence: no boxes and no frames yields `0.0`.
#[must_use]
pub fn percentile(boxes: &[BoundingBox], frame_count: Option<u32>, p: f64) -> f64 {
    let counts = frame_counts(boxes, frame_count);
    if counts.frames == 0 {
        return 0.0;
    }
    let mut non_zero: Vec<u32> = counts.per_frame.values().copied().collect();
    non_zero.sort_unstable();

    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (counts.frames - 1) as f64;
    let lower = rank.floor();
    let lo = f64::from(counts.ranked(&non_zero, lower as u64));
    let hi = f64::from(counts.ranked(&non_zero, rank.ceil() as u64));
    lo + (hi - lo) * (rank - lower)
}

/// Round a statistic for display. Halves go to the even neighbour.
#[must_use]
pub fn round_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round_ties_even() as u64
    } else {
        0
    }
}
