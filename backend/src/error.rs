use std::time::Duration;

use thiserror::Error;

use crate::exchange::ExchangeError;
use crate::poller::CyclePhase;

/// Reasons a polling cycle is aborted before publishing.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("{phase} failed: {source}")]
    Exchange {
        phase: CyclePhase,
        #[source]
        source: ExchangeError,
    },

    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: CyclePhase, after: Duration },
}

impl CycleError {
    pub fn exchange(phase: CyclePhase, source: ExchangeError) -> Self {
        CycleError::Exchange { phase, source }
    }

    pub fn timeout(phase: CyclePhase, after: Duration) -> Self {
        CycleError::Timeout { phase, after }
    }

    /// Phase the cycle was in when it was aborted.
    pub fn phase(&self) -> CyclePhase {
        match self {
            CycleError::Exchange { phase, .. } | CycleError::Timeout { phase, .. } => *phase,
        }
    }
}
