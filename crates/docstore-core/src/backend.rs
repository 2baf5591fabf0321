use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Secure-connect mode advertised by a docbroker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecureConnectMode {
    #[default]
    Native,
    Secure,
    TrySecureFirst,
}

/// One docbroker as reported by the broker protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocbrokerRow {
    /// Hostname the docbroker runs on
    pub hostname: String,
    /// Port the docbroker listens on
    pub port: u16,
    /// Secure-connect mode
    #[serde(default)]
    pub secure_mode: SecureConnectMode,
}

/// One repository as reported by a broker enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRow {
    /// Opaque backend identifier
    pub id: String,
    /// Short repository name (used for lookups)
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// One content server as reported by a per-repository enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRow {
    /// Server name (unique within the backend)
    pub name: String,
    /// Hostname the server runs on
    pub hostname: String,
    /// Proximity/cost metric relative to the caller
    pub proximity: i32,
    /// Last known status string ("Open", ...)
    #[serde(default)]
    pub last_status: Option<String>,
}

/// Login credentials bound to a session manager for one connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub login_name: String,
    pub password: String,
    pub domain: Option<String>,
}

impl Credential {
    pub fn new(login_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            password: password.into(),
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("login_name", &self.login_name)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

/// A live session obtained from a [`SessionManager`].
///
/// Releasing returns the session to the backend's pool; disconnecting tears
/// down the underlying connection.
#[async_trait]
pub trait Session: Send + Sync {
    /// Release the session back to its manager.
    async fn release(&self) -> Result<(), BackendError>;

    /// Disconnect the underlying connection.
    async fn disconnect(&self) -> Result<(), BackendError>;

    /// Whether the session currently holds a live connection.
    async fn is_connected(&self) -> bool;
}

/// Mediates session acquisition for connection strings and holds bound
/// credentials ("identities") per connection string.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Associate a credential with a connection string.
    async fn bind_identity(
        &self,
        connection_string: &str,
        credential: &Credential,
    ) -> Result<(), BackendError>;

    /// Whether an identity is already bound for a connection string.
    async fn has_identity(&self, connection_string: &str) -> bool;

    /// Obtain a session for a connection string.
    async fn get_session(&self, connection_string: &str)
        -> Result<Arc<dyn Session>, BackendError>;
}

/// Backend collaborator implementing the broker protocol.
///
/// The client treats this as its only window on the repository system: it
/// never opens connections itself and never interprets wire formats.
#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    /// Establish the backend connection. Called lazily, exactly once, before
    /// the first enumeration or session operation.
    async fn connect(&self) -> Result<(), BackendError>;

    /// Enumerate the docbrokers known to the backend.
    async fn enumerate_docbrokers(&self) -> Result<Vec<DocbrokerRow>, BackendError>;

    /// Enumerate the repositories known to the backend.
    async fn enumerate_repositories(&self) -> Result<Vec<RepositoryRow>, BackendError>;

    /// Enumerate the content servers serving one repository.
    ///
    /// # Arguments
    /// * `repository_name` - Short repository name as reported by
    ///   [`enumerate_repositories`](Self::enumerate_repositories)
    async fn enumerate_servers(
        &self,
        repository_name: &str,
    ) -> Result<Vec<ServerRow>, BackendError>;

    /// Create a fresh session manager with no identities bound.
    async fn new_session_manager(&self) -> Result<Arc<dyn SessionManager>, BackendError>;
}
