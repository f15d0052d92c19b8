//! Age-based deletion of finished segments
//!
//! A segment's age is taken from the end timestamp encoded in its name, never
//! from filesystem metadata. Names that do not decode are left alone so the
//! recording directory can hold unrelated files.

use chrono::{DateTime, Local};
use std::path::PathBuf;
use tracing::Span;

use crate::filename::{FilenameCodec, SegmentWindow};

/// A segment file eligible for age checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneCandidate {
    pub path: PathBuf,
    pub window: SegmentWindow,
    pub end: DateTime<Local>,
}

pub struct RetentionPruner {
    dir: PathBuf,
    codec: FilenameCodec,
    /// Maximum age in seconds, `None` disables pruning
    remove_older_than: Option<u64>,
    span: Span,
}

impl RetentionPruner {
    pub fn new(dir: PathBuf, codec: FilenameCodec, remove_older_than: Option<u64>, span: Span) -> Self {
        Self {
            dir,
            codec,
            remove_older_than,
            span,
        }
    }

    pub fn enabled(&self) -> bool {
        self.remove_older_than.is_some()
    }

    /// All decodable segment files in the directory, oldest end first
    pub fn candidates(&self) -> Result<Vec<PruneCandidate>, PruneError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| PruneError::ReadDir {
            dir: self.dir.clone(),
            source,
        })?;

        let mut candidates = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with(self.codec.prefix()) {
                continue;
            }
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let window = match self.codec.decode(&name) {
                Ok(window) => window,
                Err(reason) => {
                    tracing::trace!(file = %name, %reason, "skipping undecodable name");
                    continue;
                }
            };
            let Some(end) = window.end_local() else {
                continue;
            };

            candidates.push(PruneCandidate {
                path: entry.path(),
                window,
                end,
            });
        }

        candidates.sort_by_key(|c| c.end);
        Ok(candidates)
    }

    /// Delete every segment whose end is more than the retention threshold
    /// before `now`. Returns the number of files removed.
    pub fn prune(&self, now: DateTime<Local>) -> Result<usize, PruneError> {
        let Some(max_age) = self.remove_older_than else {
            return Ok(0);
        };
        let _entered = self.span.enter();
        let max_age = i64::try_from(max_age).unwrap_or(i64::MAX);

        let mut removed = 0;
        for candidate in self.candidates()? {
            let age = now.timestamp() - candidate.end.timestamp();
            if age <= max_age {
                continue;
            }

            std::fs::remove_file(&candidate.path).map_err(|source| PruneError::Remove {
                path: candidate.path.clone(),
                source,
            })?;
            tracing::info!(file = %candidate.path.display(), age_secs = age, "removed expired segment");
            removed += 1;
        }

        tracing::debug!(removed, "prune finished");
        Ok(removed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PruneError {
    #[error("failed to list {dir}: {source}")]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to delete {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
