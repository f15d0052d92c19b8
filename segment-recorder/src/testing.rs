//! Test doubles for the clock and the capture process.

use chrono::{DateTime, Local, TimeZone};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;
use crate::filename::window_end;
use crate::recorder::{Capture, RecorderError, RecordingOutcome};
use crate::schedule::SegmentPlan;

/// Clock that only moves when slept on or advanced
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Clock starting at Unix time `epoch_secs`
    pub fn at(epoch_secs: i64) -> Self {
        Self::starting(Local.timestamp_opt(epoch_secs, 0).unwrap())
    }

    pub fn starting(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = window_end(*now, duration);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// One recorder invocation seen by [`ScriptedCapture`]
#[derive(Debug, Clone)]
pub struct CaptureCall {
    pub plan: SegmentPlan,
    pub path: PathBuf,
    /// Names present in the segment directory when the attempt started
    pub dir_listing: Vec<String>,
}

/// Capture fake that writes a placeholder segment and reports scripted
/// run times; once the script is empty every attempt runs its full length.
pub struct ScriptedCapture {
    clock: Arc<ManualClock>,
    script: VecDeque<Duration>,
    pub calls: Vec<CaptureCall>,
}

impl ScriptedCapture {
    pub fn new(clock: Arc<ManualClock>, script: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            clock,
            script: script.into_iter().collect(),
            calls: Vec::new(),
        }
    }
}

impl Capture for ScriptedCapture {
    fn record(&mut self, plan: &SegmentPlan, path: &Path) -> Result<RecordingOutcome, RecorderError> {
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut dir_listing: Vec<String> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        dir_listing.sort();

        self.calls.push(CaptureCall {
            plan: *plan,
            path: path.to_path_buf(),
            dir_listing,
        });

        std::fs::write(path, b"segment")?;
        let actual = self.script.pop_front().unwrap_or(plan.duration);
        self.clock.advance(actual);

        Ok(RecordingOutcome::new(plan, path.to_path_buf(), actual))
    }
}
