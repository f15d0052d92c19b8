use std::time::Duration;
use tracing::Span;

use crate::clock::Clock;
use crate::corrector::FilenameCorrector;
use crate::detector::{Classification, Diagnostics};
use crate::error::SupervisorError;
use crate::recorder::RecordingOutcome;

/// Result of retrying a segment that ended early
#[derive(Debug, Clone)]
pub enum RetryOutcome {
    /// A retry ran to completion
    Recovered { outcome: RecordingOutcome, attempts: u32 },
    /// Every retry ended early too; carries the last one
    Exhausted { last: Diagnostics, attempts: u32 },
}

/// Re-runs failed segments a bounded number of times
#[derive(Debug, Clone)]
pub struct RetryManager {
    max_retries: u32,
    interval: Duration,
    span: Span,
}

impl RetryManager {
    pub fn new(max_retries: u32, interval: Duration, span: Span) -> Self {
        Self {
            max_retries,
            interval,
            span,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Retry after `initial` ended early.
    ///
    /// `initial` must already be corrected. Every attempt is preceded by one
    /// retry interval; each failed attempt is corrected before the next one.
    pub fn retry<F>(
        &self,
        initial: Diagnostics,
        mut attempt: F,
        corrector: &FilenameCorrector,
        clock: &dyn Clock,
    ) -> Result<RetryOutcome, SupervisorError>
    where
        F: FnMut() -> Result<Classification, SupervisorError>,
    {
        let _entered = self.span.enter();
        let mut last = initial;

        for n in 1..=self.max_retries {
            tracing::warn!(
                attempt = n,
                max_retries = self.max_retries,
                "retrying segment in {}s",
                self.interval.as_secs()
            );
            clock.sleep(self.interval);

            match attempt()? {
                Classification::Success(outcome) => {
                    tracing::info!(attempt = n, file = %outcome.path.display(), "segment recovered");
                    return Ok(RetryOutcome::Recovered {
                        outcome,
                        attempts: n,
                    });
                }
                Classification::PrematureTermination(diagnostics) => {
                    tracing::warn!(
                        attempt = n,
                        planned_secs = diagnostics.outcome.planned.as_secs(),
                        actual_secs = diagnostics.outcome.actual.as_secs(),
                        stderr = %diagnostics.stderr_tail(5),
                        "retry ended early"
                    );
                    corrector.correct(&diagnostics)?;
                    last = diagnostics;
                }
            }
        }

        Ok(RetryOutcome::Exhausted {
            last,
            attempts: self.max_retries,
        })
    }
}
