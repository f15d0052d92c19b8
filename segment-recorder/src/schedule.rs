use chrono::{DateTime, Local};
use std::time::Duration;

/// What the next capture attempt should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    /// How long the capture process is told to run
    pub duration: Duration,
    /// Wall-clock instant the segment begins
    pub start_time: DateTime<Local>,
}

/// Computes segment durations, optionally aligned to multiples of the
/// segment length counted from the Unix epoch
#[derive(Debug, Clone, Copy)]
pub struct SegmentScheduler {
    segment_secs: u64,
    alignment: bool,
}

impl SegmentScheduler {
    pub fn new(segment_secs: u64, alignment: bool) -> Self {
        Self {
            segment_secs: segment_secs.max(1),
            alignment,
        }
    }

    /// Plan a segment starting at `now`
    pub fn plan(&self, now: DateTime<Local>) -> SegmentPlan {
        SegmentPlan {
            duration: Duration::from_secs(self.duration_at(now.timestamp())),
            start_time: now,
        }
    }

    /// Segment length in seconds for a segment starting at Unix time `epoch_secs`.
    ///
    /// On a boundary this is a full segment, never zero.
    pub fn duration_at(&self, epoch_secs: i64) -> u64 {
        if !self.alignment {
            return self.segment_secs;
        }
        let offset = epoch_secs.rem_euclid(self.segment_secs as i64) as u64;
        self.segment_secs - offset
    }
}
