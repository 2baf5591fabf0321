use std::sync::{Arc, RwLock};

use docstore_core::ServerRow;
use serde::{Deserialize, Serialize};

use crate::model::entity::{Entity, EntityCore};
use crate::model::repository::Repository;

/// Connection state of a content server as seen by this client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Proximity value for a placeholder server seen on a broker before any
/// repository enumeration reported it.
const UNKNOWN_PROXIMITY: i32 = -1;

/// Session count for a server whose configuration has not been read.
const UNKNOWN_MAX_SESSIONS: i32 = -1;

#[derive(Debug)]
struct ServerState {
    repository: Option<Arc<Repository>>,
    hostname: String,
    proximity: i32,
    last_status: Option<String>,
    connection_state: ConnectionState,
    max_session_count: i32,
}

/// A process serving one repository's sessions at a given hostname.
/// Identity key is the server name.
///
/// The state behind the lock is mutated in place on every re-sighting;
/// holders of the `Arc` observe backend updates (live-handle contract).
#[derive(Debug)]
pub struct ContentServer {
    core: EntityCore,
    state: RwLock<ServerState>,
}

impl ContentServer {
    pub fn new(
        repository: Option<Arc<Repository>>,
        name: &str,
        hostname: &str,
        proximity: i32,
        last_status: Option<&str>,
    ) -> Self {
        Self {
            core: EntityCore::new(name, name),
            state: RwLock::new(ServerState {
                repository,
                hostname: hostname.to_string(),
                proximity,
                last_status: last_status.map(str::to_string),
                connection_state: ConnectionState::Disconnected,
                max_session_count: UNKNOWN_MAX_SESSIONS,
            }),
        }
    }

    /// A server sighted on a broker by hostname only: repository unknown,
    /// proximity unknown.
    pub fn placeholder(name: &str, hostname: &str) -> Self {
        Self::new(None, name, hostname, UNKNOWN_PROXIMITY, None)
    }

    pub fn from_row(repository: Arc<Repository>, row: &ServerRow) -> Self {
        Self::new(
            Some(repository),
            &row.name,
            &row.hostname,
            row.proximity,
            row.last_status.as_deref(),
        )
    }

    fn state(&self) -> std::sync::RwLockReadGuard<'_, ServerState> {
        self.state.read().expect("server state poisoned")
    }

    fn state_mut(&self) -> std::sync::RwLockWriteGuard<'_, ServerState> {
        self.state.write().expect("server state poisoned")
    }

    pub fn repository(&self) -> Option<Arc<Repository>> {
        self.state().repository.clone()
    }

    pub fn hostname(&self) -> String {
        self.state().hostname.clone()
    }

    pub fn proximity(&self) -> i32 {
        self.state().proximity
    }

    pub fn last_status(&self) -> Option<String> {
        self.state().last_status.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state().connection_state
    }

    pub fn set_connection_state(&self, connection_state: ConnectionState) {
        self.state_mut().connection_state = connection_state;
    }

    /// Maximum concurrent session count; −1 when unknown.
    pub fn max_session_count(&self) -> i32 {
        self.state().max_session_count
    }

    pub fn set_max_session_count(&self, max_session_count: i32) {
        self.state_mut().max_session_count = max_session_count;
    }

    /// Re-sighting update from a repository enumeration row: hostname,
    /// proximity and status follow the backend; the repository association
    /// and connection state are left alone.
    pub fn update_from_row(&self, row: &ServerRow) {
        let mut state = self.state_mut();
        state.hostname = row.hostname.clone();
        state.proximity = row.proximity;
        state.last_status = row.last_status.clone();
    }

    /// The backend address used to request a session:
    /// `{repositoryName}.{serverName}@{hostname}`, repository part empty
    /// while the server is not yet bound to a repository.
    pub fn connection_string(&self) -> String {
        let state = self.state();
        let repository = state
            .repository
            .as_ref()
            .map(|repo| repo.name())
            .unwrap_or_default();
        format!("{}.{}@{}", repository, self.name(), state.hostname)
    }
}

impl Entity for ContentServer {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl std::fmt::Display for ContentServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (Host:{})", self.name(), self.hostname())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_string_includes_repository_when_bound() {
        let repo = Arc::new(Repository::new("010f1", "docbase1", ""));
        let server = ContentServer::new(Some(repo), "docbase1_s1", "db1", 0, Some("Open"));
        assert_eq!(server.connection_string(), "docbase1.docbase1_s1@db1");
    }

    #[test]
    fn placeholder_has_empty_repository_part_and_unknown_metrics() {
        let server = ContentServer::placeholder("db1", "db1.company.org");
        assert_eq!(server.connection_string(), ".db1@db1.company.org");
        assert_eq!(server.proximity(), -1);
        assert_eq!(server.max_session_count(), -1);
        assert!(server.repository().is_none());
        assert_eq!(server.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn update_from_row_is_in_place() {
        let repo = Arc::new(Repository::new("010f1", "docbase1", ""));
        let server = Arc::new(ContentServer::new(
            Some(Arc::clone(&repo)),
            "docbase1_s1",
            "db1",
            0,
            Some("Open"),
        ));
        let alias = Arc::clone(&server);

        server.update_from_row(&ServerRow {
            name: "docbase1_s1".into(),
            hostname: "db2".into(),
            proximity: 5,
            last_status: Some("Stopped".into()),
        });

        // The alias observes the update: live handle, not a snapshot.
        assert_eq!(alias.hostname(), "db2");
        assert_eq!(alias.proximity(), 5);
        assert_eq!(alias.last_status().as_deref(), Some("Stopped"));
        assert!(alias.repository().is_some());
    }
}
