use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::Span;

use crate::config::RecordingConfig;
use crate::filename::window_end;
use crate::schedule::SegmentPlan;

/// How often a running capture process is checked for exit
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Time a process gets to exit after SIGTERM before it is killed
const TERM_WAIT: Duration = Duration::from_secs(2);

/// External tool that performs the actual capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    #[default]
    Vlc,
    Ffmpeg,
}

impl CaptureBackend {
    /// Executable looked up on `PATH` when no override is configured
    pub fn default_binary(&self) -> &'static str {
        match self {
            CaptureBackend::Vlc => "vlc",
            CaptureBackend::Ffmpeg => "ffmpeg",
        }
    }

    /// Arguments that capture `source` into `path` for `duration`, then exit
    pub fn args(&self, source: &str, container: &str, path: &Path, duration: Duration) -> Vec<String> {
        let secs = duration.as_secs().to_string();
        let path = path.to_string_lossy();
        match self {
            CaptureBackend::Vlc => vec![
                source.to_string(),
                format!("--sout=file/{}:{}", container, path),
                "-I".to_string(),
                "dummy".to_string(),
                format!("--stop-time={}", secs),
                "vlc://quit".to_string(),
            ],
            CaptureBackend::Ffmpeg => {
                let mut args = Vec::new();
                if source.starts_with("rtsp://") || source.starts_with("rtsps://") {
                    args.extend(["-rtsp_transport".to_string(), "tcp".to_string()]);
                }
                args.extend([
                    "-i".to_string(),
                    source.to_string(),
                    // Copy without re-encoding
                    "-c".to_string(),
                    "copy".to_string(),
                    "-t".to_string(),
                    secs,
                    "-y".to_string(),
                    "-loglevel".to_string(),
                    "warning".to_string(),
                    path.into_owned(),
                ]);
                args
            }
        }
    }
}

/// Everything known about one finished capture attempt
#[derive(Debug, Clone)]
pub struct RecordingOutcome {
    /// Segment file the capture process wrote to
    pub path: PathBuf,
    pub start: DateTime<Local>,
    /// `start` plus the measured elapsed time
    pub end: DateTime<Local>,
    pub planned: Duration,
    /// Wall-clock time measured around the process, not self-reported
    pub actual: Duration,
    /// Exit code, `None` when the process died from a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RecordingOutcome {
    /// Build an outcome for a capture that started at `plan.start_time` and ran for `actual`
    pub fn new(plan: &SegmentPlan, path: PathBuf, actual: Duration) -> Self {
        Self {
            path,
            start: plan.start_time,
            end: window_end(plan.start_time, actual),
            planned: plan.duration,
            actual,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Runs one capture attempt to completion
pub trait Capture {
    fn record(&mut self, plan: &SegmentPlan, path: &Path) -> Result<RecordingOutcome, RecorderError>;
}

/// Captures segments by running the configured external tool
pub struct Recorder {
    backend: CaptureBackend,
    binary: PathBuf,
    source: String,
    container: String,
    stop_grace: Duration,
    span: Span,
}

impl Recorder {
    /// Create a new recorder with the given configuration
    pub fn new(config: &RecordingConfig, span: Span) -> Self {
        let binary = config
            .capture_binary
            .clone()
            .unwrap_or_else(|| PathBuf::from(config.backend.default_binary()));

        Self {
            backend: config.backend,
            binary,
            source: config.source.clone(),
            container: config.container.clone(),
            stop_grace: config.stop_grace(),
            span,
        }
    }

    fn spawn(&self, plan: &SegmentPlan, path: &Path) -> Result<Child, RecorderError> {
        Command::new(&self.binary)
            .args(self.backend.args(&self.source, &self.container, path, plan.duration))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RecorderError::CaptureToolNotFound(self.binary.clone())
                } else {
                    RecorderError::Io(e)
                }
            })
    }

    /// Stop a capture that overran its deadline
    fn terminate(&self, child: &mut Child) -> Result<Option<ExitStatus>, RecorderError> {
        // SIGTERM first so the muxer can finalize the file
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Err(e) = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
                tracing::debug!("SIGTERM to capture process failed: {}", e);
            }

            let asked = Instant::now();
            while asked.elapsed() < TERM_WAIT {
                if let Some(status) = child.try_wait()? {
                    return Ok(Some(status));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }

        tracing::warn!("capture process ignored SIGTERM, killing it");
        let _ = child.kill();
        Ok(Some(child.wait()?))
    }
}

impl Capture for Recorder {
    fn record(&mut self, plan: &SegmentPlan, path: &Path) -> Result<RecordingOutcome, RecorderError> {
        let _entered = self.span.enter();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(
            file = %path.display(),
            duration_secs = plan.duration.as_secs(),
            "start recording"
        );

        let mut child = self.spawn(plan, path)?;
        let started = Instant::now();
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = plan.duration + self.stop_grace;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) if started.elapsed() >= deadline => {
                    tracing::warn!(
                        overrun_secs = started.elapsed().saturating_sub(plan.duration).as_secs(),
                        "capture process overran its segment, stopping it"
                    );
                    break self.terminate(&mut child)?;
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RecorderError::Io(e));
                }
            }
        };
        let actual = started.elapsed();

        let mut outcome = RecordingOutcome::new(plan, path.to_path_buf(), actual);
        outcome.exit_code = status.and_then(|s| s.code());
        outcome.stdout = collect(stdout);
        outcome.stderr = collect(stderr);

        tracing::info!(
            elapsed_secs = actual.as_secs(),
            exit_code = ?outcome.exit_code,
            "end recording"
        );

        Ok(outcome)
    }
}

/// Read a child's output stream to the end on its own thread
fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    stream.map(|mut stream| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stream.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("capture tool {0} not found - is it installed?")]
    CaptureToolNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
