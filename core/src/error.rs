use thiserror::Error;

use leadscout_backend_client::BackendError;

use crate::pipeline::HuntPhase;

#[derive(Debug, Error)]
pub enum HuntError {
    /// Transport, quota, or credential failure from the backend client.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The stream carried an `error` event marked fatal.
    #[error("pipeline aborted: {0}")]
    Aborted(String),

    /// Strict termination mode only: the stream closed without a
    /// terminal event.
    #[error("stream closed without a terminal event")]
    Truncated,

    /// The requested operation is not defined for the run's current
    /// phase (e.g. launching qualification before discovery finished).
    #[error("operation not valid in phase {phase:?}")]
    InvalidPhase { phase: HuntPhase },
}
