use std::fmt;
use std::path::Path;

/// Space on the filesystem holding the recordings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskUsage {
    /// Usage of the filesystem containing `path`
    pub fn of(path: &Path) -> Result<Self, DiskError> {
        use nix::sys::statvfs::statvfs;

        let stat = statvfs(path).map_err(|e| DiskError::StatvfsFailed(e.to_string()))?;
        if stat.blocks() == 0 {
            return Err(DiskError::InvalidFilesystem);
        }

        let block_size = stat.fragment_size() as u64;
        Ok(Self {
            total_bytes: stat.blocks() as u64 * block_size,
            available_bytes: stat.blocks_available() as u64 * block_size,
        })
    }

    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    pub fn percent_used(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        ((self.used_bytes() as f64 / self.total_bytes as f64) * 100.0) as u8
    }
}

impl fmt::Display for DiskUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} ({}% used, {} available)",
            format_bytes(self.used_bytes()),
            format_bytes(self.total_bytes),
            self.percent_used(),
            format_bytes(self.available_bytes)
        )
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = None;
    for candidate in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = Some(candidate);
    }

    match unit {
        Some(unit) => format!("{:.1}{}", value, unit),
        None => format!("{}B", bytes),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    #[error("Failed to get filesystem stats: {0}")]
    StatvfsFailed(String),
    #[error("Invalid filesystem")]
    InvalidFilesystem,
}
