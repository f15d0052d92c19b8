//! Errors that end a supervisor cycle

use crate::config::ConfigError;
use crate::corrector::CorrectionError;
use crate::detector::Diagnostics;
use crate::recorder::RecorderError;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    Correction(#[from] CorrectionError),

    #[error(
        "segment {} still ended early after {attempts} retries ({}s of {}s recorded)",
        .diagnostics.outcome.path.display(),
        .diagnostics.outcome.actual.as_secs(),
        .diagnostics.outcome.planned.as_secs()
    )]
    FatalExhaustion {
        attempts: u32,
        diagnostics: Box<Diagnostics>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Whether the error only spoils the current cycle, so a supervisor
    /// running with a backoff policy may carry on with the next one
    pub fn is_cycle_local(&self) -> bool {
        matches!(
            self,
            SupervisorError::FatalExhaustion { .. }
                | SupervisorError::Correction(_)
                | SupervisorError::Recorder(RecorderError::Io(_))
        )
    }
}
