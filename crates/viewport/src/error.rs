use credentials::GateError;
use locations::NotFound;

use crate::engine::{EngineError, MarkerId};

/// Why a `fly_to` did nothing. None of these reach the end user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error(transparent)]
    OutOfRange(#[from] NotFound),
    #[error("no ready viewport session")]
    NotReady,
    #[error("{0} belongs to no location")]
    UnknownMarker(MarkerId),
    #[error("fly-to requires a running tokio runtime")]
    NoRuntime,
    #[error("camera command failed: {0}")]
    Engine(#[source] EngineError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigatorError {
    #[error("access token must not be empty")]
    InvalidInput,
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// A newer initialization or a clear overtook this one.
    #[error("initialization superseded")]
    Superseded,
    #[error("no retained credential to retry with")]
    NothingToRetry,
    #[error(transparent)]
    Gate(GateError),
}

impl From<GateError> for NavigatorError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::InvalidInput => NavigatorError::InvalidInput,
            other => NavigatorError::Gate(other),
        }
    }
}
