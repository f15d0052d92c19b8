//! Classifies finished captures by how long they actually ran.
//!
//! The capture tool's exit code is not consulted: a run to completion, a stop
//! triggered by the duration directive and a crash are not reliably
//! distinguishable from it.

use std::time::Duration;

use crate::recorder::RecordingOutcome;

/// Slack absorbing process start and stop overhead
pub const TOLERANCE: Duration = Duration::from_secs(3);

/// A capture that stopped short of its planned duration
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub outcome: RecordingOutcome,
}

impl Diagnostics {
    /// How much of the planned segment is missing
    pub fn shortfall(&self) -> Duration {
        self.outcome.planned.saturating_sub(self.outcome.actual)
    }

    /// Last `max_lines` lines of captured stderr, for log messages
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self.outcome.stderr.lines().collect();
        let skip = lines.len().saturating_sub(max_lines);
        lines[skip..].join("\n")
    }
}

#[derive(Debug, Clone)]
pub enum Classification {
    Success(RecordingOutcome),
    PrematureTermination(Diagnostics),
}

impl Classification {
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FailureDetector {
    tolerance: Duration,
}

impl Default for FailureDetector {
    fn default() -> Self {
        Self::new(TOLERANCE)
    }
}

impl FailureDetector {
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    /// Success iff `actual >= planned - tolerance`
    pub fn classify(&self, outcome: RecordingOutcome) -> Classification {
        if outcome.actual >= outcome.planned.saturating_sub(self.tolerance) {
            Classification::Success(outcome)
        } else {
            Classification::PrematureTermination(Diagnostics { outcome })
        }
    }
}
