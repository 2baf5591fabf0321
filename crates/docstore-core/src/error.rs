//! Error type spoken by backend collaborators.

/// Errors returned by a repository backend.
///
/// Acquisition-path failures (enumeration, connect, session creation) are
/// propagated to the caller untouched; the client never retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or an enumeration failed.
    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },

    /// A session-level call (bind, acquire, release, disconnect) failed.
    #[error("session error: {reason}")]
    Session { reason: String },
}

impl BackendError {
    /// Shorthand for an unavailable-backend error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Shorthand for a session-level error.
    pub fn session(reason: impl Into<String>) -> Self {
        Self::Session {
            reason: reason.into(),
        }
    }
}
