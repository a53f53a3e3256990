use std::fmt;

use projectp_common::MediaKind;

/// Caption text combining the rounded detection statistic and elapsed time.
///
/// Photos report seconds, videos report minutes, both with three decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseSummary {
    pub objects: u64,
    pub total_seconds: f64,
    pub media_kind: MediaKind,
}

impl ResponseSummary {
    #[must_use]
    pub fn new(objects: u64, total_seconds: f64, media_kind: MediaKind) -> Self {
        Self {
            objects,
            total_seconds,
            media_kind,
        }
    }
}

impl fmt::Display for ResponseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.media_kind {
            MediaKind::Photo => write!(
                f,
                "Detected {} objects in {:.3} sec",
                self.objects, self.total_seconds
            ),
            MediaKind::Video => write!(
                f,
                "Detected {} objects in {:.3} min",
                self.objects,
                self.total_seconds / 60.0
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_summary_in_seconds() {
        let summary = ResponseSummary::new(3, 1.234, MediaKind::Photo);
        assert_eq!(summary.to_string(), "Detected 3 objects in 1.234 sec");
    }

    #[test]
    fn video_summary_in_minutes() {
        let summary = ResponseSummary::new(12, 90.0, MediaKind::Video);
        assert_eq!(summary.to_string(), "Detected 12 objects in 1.500 min");
    }
}
