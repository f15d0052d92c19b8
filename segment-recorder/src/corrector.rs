use std::path::{Path, PathBuf};
use tracing::Span;

use crate::detector::Diagnostics;
use crate::filename::FilenameCodec;

/// Renames a short segment so its filename covers what was really captured
pub struct FilenameCorrector {
    codec: FilenameCodec,
    span: Span,
}

impl FilenameCorrector {
    pub fn new(codec: FilenameCodec, span: Span) -> Self {
        Self { codec, span }
    }

    /// Rename the failed segment to `start .. start + actual`.
    ///
    /// Returns the new path, or the old one when the format's resolution makes
    /// both names identical. A corrected name that is already taken, typically
    /// by an earlier failure within the same minute, gets the next free
    /// numbered variant.
    pub fn correct(&self, diagnostics: &Diagnostics) -> Result<PathBuf, CorrectionError> {
        let _entered = self.span.enter();
        let outcome = &diagnostics.outcome;

        if !outcome.path.exists() {
            return Err(CorrectionError::SourceMissing(outcome.path.clone()));
        }

        let dir = outcome.path.parent().unwrap_or(Path::new("."));
        let mut candidates = self.codec.paths_in(dir, outcome.start, outcome.actual);
        let corrected = loop {
            let Some(candidate) = candidates.next() else {
                let taken = dir.join(self.codec.encode(outcome.start, outcome.actual));
                return Err(CorrectionError::DestinationExists(taken));
            };
            if candidate == outcome.path {
                tracing::debug!(file = %candidate.display(), "segment name already matches its window");
                return Ok(candidate);
            }
            if !candidate.exists() {
                break candidate;
            }
        };

        std::fs::rename(&outcome.path, &corrected).map_err(|source| CorrectionError::Rename {
            from: outcome.path.clone(),
            to: corrected.clone(),
            source,
        })?;

        tracing::info!(
            from = %outcome.path.display(),
            to = %corrected.display(),
            "renamed short segment"
        );

        Ok(corrected)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CorrectionError {
    #[error("segment file {0} is missing")]
    SourceMissing(PathBuf),
    #[error("corrected segment name {0} and all its numbered variants are taken")]
    DestinationExists(PathBuf),
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecordingOutcome;
    use crate::schedule::SegmentPlan;
    use crate::filename::MAX_VARIANT;
    use chrono::{Local, TimeZone};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn codec() -> FilenameCodec {
        FilenameCodec::new("record-", "%Y-%m-%dT%H:%M", "ts").unwrap()
    }

    fn diagnostics(dir: &Path, planned: u64, actual: u64) -> Diagnostics {
        let plan = SegmentPlan {
            duration: Duration::from_secs(planned),
            start_time: Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let path = dir.join(codec().encode(plan.start_time, plan.duration));
        Diagnostics {
            outcome: RecordingOutcome::new(&plan, path, Duration::from_secs(actual)),
        }
    }

    #[test]
    fn test_rename_to_actual_window() {
        let dir = tempdir().unwrap();
        let diag = diagnostics(dir.path(), 1800, 600);
        fs::write(&diag.outcome.path, b"partial").unwrap();

        let corrected = FilenameCorrector::new(codec(), Span::none())
            .correct(&diag)
            .unwrap();

        assert_eq!(
            corrected.file_name().unwrap(),
            "record-2024-01-01T00:00_2024-01-01T00:10.ts"
        );
        assert!(!diag.outcome.path.exists());
        assert_eq!(fs::read(&corrected).unwrap(), b"partial");

        let window = codec()
            .decode(corrected.file_name().unwrap().to_str().unwrap())
            .unwrap();
        assert_eq!(window.start, diag.outcome.start.naive_local());
        assert_eq!(window.end - window.start, chrono::Duration::seconds(600));
    }

    #[test]
    fn test_same_name_is_noop() {
        let dir = tempdir().unwrap();
        // 100s planned vs 90s actual both end inside minute 00:01
        let diag = diagnostics(dir.path(), 100, 90);
        fs::write(&diag.outcome.path, b"partial").unwrap();

        let corrected = FilenameCorrector::new(codec(), Span::none())
            .correct(&diag)
            .unwrap();
        assert_eq!(corrected, diag.outcome.path);
        assert!(corrected.exists());
    }

    #[test]
    fn test_missing_source() {
        let dir = tempdir().unwrap();
        let diag = diagnostics(dir.path(), 1800, 600);

        let result = FilenameCorrector::new(codec(), Span::none()).correct(&diag);
        assert!(matches!(result, Err(CorrectionError::SourceMissing(_))));
    }

    #[test]
    fn test_taken_name_gets_numbered_variant() {
        let dir = tempdir().unwrap();
        let diag = diagnostics(dir.path(), 1800, 600);
        fs::write(&diag.outcome.path, b"partial").unwrap();
        let taken = dir.path().join("record-2024-01-01T00:00_2024-01-01T00:10.ts");
        fs::write(&taken, b"older").unwrap();

        let corrected = FilenameCorrector::new(codec(), Span::none())
            .correct(&diag)
            .unwrap();

        assert_eq!(
            corrected.file_name().unwrap(),
            "record-2024-01-01T00:00_2024-01-01T00:10.1.ts"
        );
        assert_eq!(fs::read(&taken).unwrap(), b"older");
        assert_eq!(fs::read(&corrected).unwrap(), b"partial");
        assert!(!diag.outcome.path.exists());
    }

    #[test]
    fn test_failures_within_one_minute_keep_distinct_files() {
        let dir = tempdir().unwrap();
        let corrector = FilenameCorrector::new(codec(), Span::none());

        let mut corrected = Vec::new();
        for n in 0..3u8 {
            let diag = diagnostics(dir.path(), 1800, 5);
            fs::write(&diag.outcome.path, [n]).unwrap();
            corrected.push(corrector.correct(&diag).unwrap());
        }

        let names: Vec<_> = corrected
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "record-2024-01-01T00:00_2024-01-01T00:00.ts",
                "record-2024-01-01T00:00_2024-01-01T00:00.1.ts",
                "record-2024-01-01T00:00_2024-01-01T00:00.2.ts",
            ]
        );
        for (n, path) in corrected.iter().enumerate() {
            assert_eq!(fs::read(path).unwrap(), vec![n as u8]);
        }
    }

    #[test]
    fn test_destination_taken() {
        let dir = tempdir().unwrap();
        let diag = diagnostics(dir.path(), 1800, 600);
        fs::write(&diag.outcome.path, b"partial").unwrap();
        for n in 0..=MAX_VARIANT {
            let taken = codec().encode_variant(diag.outcome.start, diag.outcome.actual, n);
            fs::write(dir.path().join(taken), b"older").unwrap();
        }

        let result = FilenameCorrector::new(codec(), Span::none()).correct(&diag);
        assert!(matches!(result, Err(CorrectionError::DestinationExists(_))));
        assert!(diag.outcome.path.exists());
    }
}
