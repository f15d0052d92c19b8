//! Segment filename encoding
//!
//! A segment's wall-clock window is the only durable record of what it
//! contains, so it is written into the filename itself:
//!
//! ```text
//! <prefix><start>_<end>.<container>
//! record-2024-01-01T00:00_2024-01-01T00:30.mp4
//! ```
//!
//! Both timestamps use the same strftime pattern. Decoding is lossy down to
//! the pattern's resolution, so two segments can share a window; the later one
//! gets a numbered name such as `record-2024-01-01T00:00_2024-01-01T00:00.1.mp4`.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Separator between the start and end timestamps
pub const SEPARATOR: char = '_';

/// Highest number appended to a name whose window is already taken
pub const MAX_VARIANT: u32 = 999;

/// Start and end of a segment as decoded from its filename (local time)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SegmentWindow {
    /// Resolve the end timestamp in the local timezone.
    ///
    /// Returns `None` for local times skipped by a DST transition.
    pub fn end_local(&self) -> Option<DateTime<Local>> {
        Local.from_local_datetime(&self.end).earliest()
    }
}

/// Encodes and decodes segment windows to and from filenames
#[derive(Debug, Clone)]
pub struct FilenameCodec {
    prefix: String,
    datetime_format: String,
    extension: String,
}

impl FilenameCodec {
    /// Build a codec for `<prefix><start>_<end>.<container>` names.
    ///
    /// Rejects timestamp patterns chrono cannot render, patterns that contain
    /// the separator, and patterns that do not parse back into a timestamp.
    pub fn new(prefix: &str, datetime_format: &str, container: &str) -> Result<Self, CodecError> {
        if StrftimeItems::new(datetime_format).any(|item| matches!(item, Item::Error)) {
            return Err(CodecError::InvalidFormat(datetime_format.to_string()));
        }
        if datetime_format.contains(SEPARATOR) {
            return Err(CodecError::AmbiguousFormat(datetime_format.to_string()));
        }

        let codec = Self {
            prefix: prefix.to_string(),
            datetime_format: datetime_format.to_string(),
            extension: format!(".{}", container),
        };

        // A pattern such as "%H" renders fine but can never be parsed again,
        // which would leave every segment unprunable.
        let sample = NaiveDate::from_ymd_opt(2001, 2, 3)
            .and_then(|d| d.and_hms_opt(4, 5, 6))
            .ok_or_else(|| CodecError::InvalidFormat(datetime_format.to_string()))?;
        let rendered = sample.format(datetime_format).to_string();
        if codec.parse_timestamp(&rendered).is_none() {
            return Err(CodecError::NotReversible(datetime_format.to_string()));
        }

        Ok(codec)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Filename for a segment starting at `start` and lasting `duration`
    pub fn encode(&self, start: DateTime<Local>, duration: Duration) -> String {
        self.encode_variant(start, duration, 0)
    }

    /// Like [`encode`](Self::encode), with `.<variant>` before the extension
    /// when `variant` is non-zero
    pub fn encode_variant(&self, start: DateTime<Local>, duration: Duration, variant: u32) -> String {
        let end = window_end(start, duration);
        let suffix = if variant == 0 {
            String::new()
        } else {
            format!(".{}", variant)
        };
        format!(
            "{}{}{}{}{}{}",
            self.prefix,
            start.format(&self.datetime_format),
            SEPARATOR,
            end.format(&self.datetime_format),
            suffix,
            self.extension
        )
    }

    /// Candidate paths in `dir` for a window, plain name first, then
    /// numbered variants up to [`MAX_VARIANT`]
    pub fn paths_in<'a>(
        &'a self,
        dir: &'a Path,
        start: DateTime<Local>,
        duration: Duration,
    ) -> impl Iterator<Item = PathBuf> + 'a {
        (0..=MAX_VARIANT).map(move |n| dir.join(self.encode_variant(start, duration, n)))
    }

    /// Decode the window encoded in `name`.
    ///
    /// Foreign or malformed names yield a [`ParseFailure`]; callers skip them.
    pub fn decode(&self, name: &str) -> Result<SegmentWindow, ParseFailure> {
        let body = name
            .strip_prefix(&self.prefix)
            .ok_or(ParseFailure::WrongPrefix)?;
        let body = body
            .strip_suffix(&self.extension)
            .ok_or(ParseFailure::WrongExtension)?;
        let (start, end) = body
            .split_once(SEPARATOR)
            .ok_or(ParseFailure::MissingSeparator)?;

        let start = self
            .parse_timestamp(start)
            .ok_or_else(|| ParseFailure::InvalidTimestamp(start.to_string()))?;
        let end = self
            .parse_timestamp(end)
            .or_else(|| {
                let (end, variant) = end.rsplit_once('.')?;
                if variant.is_empty() || !variant.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                self.parse_timestamp(end)
            })
            .ok_or_else(|| ParseFailure::InvalidTimestamp(end.to_string()))?;

        Ok(SegmentWindow { start, end })
    }

    fn parse_timestamp(&self, input: &str) -> Option<NaiveDateTime> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, &self.datetime_format) {
            return Some(naive);
        }

        // Date-only patterns ("%Y-%m-%d") mean midnight
        NaiveDate::parse_from_str(input, &self.datetime_format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

/// `start + duration`, saturating at `start` if the sum is unrepresentable
pub(crate) fn window_end(start: DateTime<Local>, duration: Duration) -> DateTime<Local> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| start.checked_add_signed(d))
        .unwrap_or(start)
}

/// Why a filename could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("name does not start with the segment prefix")]
    WrongPrefix,
    #[error("name does not end with the segment extension")]
    WrongExtension,
    #[error("no '_' between start and end timestamps")]
    MissingSeparator,
    #[error("unparseable timestamp: {0}")]
    InvalidTimestamp(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid timestamp format: {0}")]
    InvalidFormat(String),
    #[error("timestamp format {0:?} contains the '_' separator")]
    AmbiguousFormat(String),
    #[error("timestamp format {0:?} cannot be parsed back into a date")]
    NotReversible(String),
}
