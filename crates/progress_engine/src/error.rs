use progress_core::{Phase, ValidationError};
use thiserror::Error;

use crate::{ConfigError, TransportError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid upload: {0}")]
    Validation(#[from] ValidationError),
    #[error("upload failed: {0}")]
    Submit(TransportError),
    #[error("a job is already in progress ({phase:?})")]
    Busy { phase: Phase },
    #[error("no job is being monitored ({phase:?})")]
    NotMonitoring { phase: Phase },
    #[error("the session was torn down before the upload finished")]
    Aborted,
    #[error("transport setup failed: {0}")]
    Transport(TransportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
