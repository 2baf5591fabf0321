use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use docstore_core::{
    BackendError, DocbrokerRow, RepositoryBackend, RepositoryRow, SecureConnectMode, ServerRow,
    SessionManager,
};
use tracing::debug;

use crate::session::{MemoryManager, MemorySession, Shared};

/// Scripted broker topology.
#[derive(Default)]
struct Topology {
    docbrokers: Vec<DocbrokerRow>,
    repositories: Vec<RepositoryRow>,
    /// Repository name -> server rows
    servers: HashMap<String, Vec<ServerRow>>,
}

/// In-memory [`RepositoryBackend`] with a mutable script and failure
/// injection. The script may be changed between calls to model
/// re-enumeration (servers added, decommissioned, renamed).
pub struct MemoryBackend {
    topology: RwLock<Topology>,
    connect_calls: AtomicUsize,
    fail_connect: AtomicBool,
    managers_created: AtomicUsize,
    shared: Arc<Shared>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a backend with an empty topology script.
    pub fn new() -> Self {
        Self {
            topology: RwLock::new(Topology::default()),
            connect_calls: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            managers_created: AtomicUsize::new(0),
            shared: Arc::new(Shared::new()),
        }
    }

    fn topology_mut(&self) -> std::sync::RwLockWriteGuard<'_, Topology> {
        self.topology.write().expect("topology poisoned")
    }

    fn topology_ref(&self) -> std::sync::RwLockReadGuard<'_, Topology> {
        self.topology.read().expect("topology poisoned")
    }

    /// Script a docbroker row.
    pub fn add_docbroker(&self, hostname: &str, port: u16, secure_mode: SecureConnectMode) {
        self.topology_mut().docbrokers.push(DocbrokerRow {
            hostname: hostname.to_string(),
            port,
            secure_mode,
        });
    }

    /// Script a repository row.
    pub fn add_repository(&self, id: &str, name: &str, description: &str) {
        self.topology_mut().repositories.push(RepositoryRow {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        });
    }

    /// Replace the server rows enumerated for a repository.
    pub fn set_servers(&self, repository_name: &str, rows: Vec<ServerRow>) {
        self.topology_mut()
            .servers
            .insert(repository_name.to_string(), rows);
    }

    /// Every `(connection_string, login_name)` bind recorded across all
    /// managers, in call order.
    pub fn bind_calls(&self) -> Vec<(String, String)> {
        self.shared.bind_log.lock().expect("bind log poisoned").clone()
    }

    /// Number of times `connect` was called.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of session managers created.
    pub fn managers_created(&self) -> usize {
        self.managers_created.load(Ordering::SeqCst)
    }

    /// Every session ever created, in creation order.
    pub fn sessions(&self) -> Vec<Arc<MemorySession>> {
        self.shared
            .sessions
            .lock()
            .expect("session log poisoned")
            .clone()
    }

    /// Make the next `connect` calls fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make session acquisition fail for a connection string.
    pub fn fail_acquire_for(&self, connection_string: &str) {
        self.shared
            .fail_acquire
            .insert(connection_string.to_string());
    }

    /// Make `release` fail for a connection string.
    pub fn fail_release_for(&self, connection_string: &str) {
        self.shared
            .fail_release
            .insert(connection_string.to_string());
    }

    /// Make `disconnect` fail for a connection string.
    pub fn fail_disconnect_for(&self, connection_string: &str) {
        self.shared
            .fail_disconnect
            .insert(connection_string.to_string());
    }
}

#[async_trait]
impl RepositoryBackend for MemoryBackend {
    async fn connect(&self) -> Result<(), BackendError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(BackendError::unavailable("scripted connect failure"));
        }
        debug!("memory backend connected");
        Ok(())
    }

    async fn enumerate_docbrokers(&self) -> Result<Vec<DocbrokerRow>, BackendError> {
        Ok(self.topology_ref().docbrokers.clone())
    }

    async fn enumerate_repositories(&self) -> Result<Vec<RepositoryRow>, BackendError> {
        Ok(self.topology_ref().repositories.clone())
    }

    async fn enumerate_servers(
        &self,
        repository_name: &str,
    ) -> Result<Vec<ServerRow>, BackendError> {
        Ok(self
            .topology_ref()
            .servers
            .get(repository_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn new_session_manager(&self) -> Result<Arc<dyn SessionManager>, BackendError> {
        self.managers_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryManager::new(Arc::clone(&self.shared))))
    }
}
