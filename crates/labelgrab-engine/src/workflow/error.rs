use super::step::WorkflowStep;
use crate::backend::BackendError;
use crate::session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("[{step}] {source}")]
    Session {
        step: WorkflowStep,
        #[source]
        source: SessionError,
    },

    #[error("[{step}] required control not found: {intent}")]
    LocatorNotFound { step: WorkflowStep, intent: String },

    #[error("[{step}] navigation timed out: {url}")]
    NavigationTimeout { step: WorkflowStep, url: String },

    #[error("[{step}] no route to the orders list from {url}")]
    NoRoute { step: WorkflowStep, url: String },

    #[error("[{step}] browser error: {source}")]
    Backend {
        step: WorkflowStep,
        #[source]
        source: BackendError,
    },

    #[error("[{step}] filesystem error: {source}")]
    Io {
        step: WorkflowStep,
        #[source]
        source: std::io::Error,
    },

    #[error("run cancelled during {step}")]
    Cancelled { step: WorkflowStep },
}

impl RunError {
    pub fn step(&self) -> WorkflowStep {
        match self {
            RunError::Session { step, .. }
            | RunError::LocatorNotFound { step, .. }
            | RunError::NavigationTimeout { step, .. }
            | RunError::NoRoute { step, .. }
            | RunError::Backend { step, .. }
            | RunError::Io { step, .. }
            | RunError::Cancelled { step } => *step,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RunError::Session {
                source: SessionError::Authentication(_),
                ..
            } => "AUTHENTICATION_ERROR",
            RunError::Session {
                source: SessionError::Cancelled,
                ..
            }
            | RunError::Cancelled { .. } => "CANCELLED",
            RunError::Session {
                source: SessionError::Backend(e),
                ..
            }
            | RunError::Backend { source: e, .. } => e.code(),
            RunError::Session { .. } => "SESSION_ERROR",
            RunError::LocatorNotFound { .. } => "LOCATOR_NOT_FOUND",
            RunError::NavigationTimeout { .. } => "NAVIGATION_TIMEOUT",
            RunError::NoRoute { .. } => "NO_ROUTE",
            RunError::Io { .. } => "IO_ERROR",
        }
    }

    /// Wrap a backend error, promoting navigation timeouts to their own kind.
    pub(crate) fn backend(step: WorkflowStep, source: BackendError) -> Self {
        match source {
            BackendError::NavigationTimeout { url, .. } => RunError::NavigationTimeout { step, url },
            source => RunError::Backend { step, source },
        }
    }

    pub(crate) fn session(step: WorkflowStep, source: SessionError) -> Self {
        match source {
            SessionError::Cancelled => RunError::Cancelled { step },
            SessionError::Backend(BackendError::NavigationTimeout { url, .. }) => {
                RunError::NavigationTimeout { step, url }
            }
            source => RunError::Session { step, source },
        }
    }
}
