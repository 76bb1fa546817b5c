pub mod manager;
pub mod store;

pub use manager::SessionManager;
pub use store::SessionStore;

use crate::backend::BackendError;
use crate::protocol::CookieRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Persisted authentication state: the cookie records of a completed login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    cookies: Vec<CookieRecord>,
}

impl Session {
    pub fn new(cookies: Vec<CookieRecord>) -> Self {
        Self { cookies }
    }

    pub fn cookies(&self) -> &[CookieRecord] {
        &self.cookies
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Drop records that have already expired.
    pub fn without_expired(&self, now_unix: f64) -> Session {
        Session {
            cookies: self
                .cookies
                .iter()
                .filter(|c| !c.is_expired_at(now_unix))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Restoring,
    Valid,
    Invalid,
    Authenticating,
    Authenticated,
    AuthFailed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Valid | SessionState::Authenticated | SessionState::AuthFailed
        )
    }
}

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("no {0} configured")]
    MissingCredential(&'static str),

    #[error("{field} field not found within {wait:?}")]
    FieldNotFound { field: &'static str, wait: Duration },

    #[error("still on the login page after submit ({url})")]
    StillOnLogin { url: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthenticationError),

    #[error("Cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_expired_filters_records() {
        let live = CookieRecord {
            name: "live".into(),
            value: "1".into(),
            domain: "example.com".into(),
            path: "/".into(),
            expires: Some(2_000.0),
            http_only: false,
            secure: false,
            same_site: None,
        };
        let stale = CookieRecord {
            name: "stale".into(),
            expires: Some(10.0),
            ..live.clone()
        };
        let session = Session::new(vec![live, stale]).without_expired(1_000.0);
        assert_eq!(session.cookies().len(), 1);
        assert_eq!(session.cookies()[0].name, "live");
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Valid.is_terminal());
        assert!(SessionState::AuthFailed.is_terminal());
        assert!(!SessionState::Invalid.is_terminal());
    }
}
