use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use docstore_core::{BackendError, Credential, Session, SessionManager};
use tracing::debug;

/// State shared between the backend and every manager/session it hands out:
/// the bind-call record, scripted failures, and the created-session log.
pub(crate) struct Shared {
    pub(crate) bind_log: Mutex<Vec<(String, String)>>,
    pub(crate) fail_acquire: DashSet<String>,
    pub(crate) fail_release: DashSet<String>,
    pub(crate) fail_disconnect: DashSet<String>,
    pub(crate) sessions: Mutex<Vec<Arc<MemorySession>>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            bind_log: Mutex::new(Vec::new()),
            fail_acquire: DashSet::new(),
            fail_release: DashSet::new(),
            fail_disconnect: DashSet::new(),
            sessions: Mutex::new(Vec::new()),
        }
    }
}

/// Session manager handed out by [`MemoryBackend`](crate::MemoryBackend).
///
/// Identities are kept per connection string; every bind call is recorded in
/// the backend's bind log so tests can assert on bind counts.
pub struct MemoryManager {
    shared: Arc<Shared>,
    identities: DashMap<String, Credential>,
}

impl MemoryManager {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            identities: DashMap::new(),
        }
    }
}

#[async_trait]
impl SessionManager for MemoryManager {
    async fn bind_identity(
        &self,
        connection_string: &str,
        credential: &Credential,
    ) -> Result<(), BackendError> {
        self.shared
            .bind_log
            .lock()
            .expect("bind log poisoned")
            .push((
                connection_string.to_string(),
                credential.login_name.clone(),
            ));
        self.identities
            .insert(connection_string.to_string(), credential.clone());
        debug!(connection = connection_string, "identity bound");
        Ok(())
    }

    async fn has_identity(&self, connection_string: &str) -> bool {
        self.identities.contains_key(connection_string)
    }

    async fn get_session(
        &self,
        connection_string: &str,
    ) -> Result<Arc<dyn Session>, BackendError> {
        if self.shared.fail_acquire.contains(connection_string) {
            return Err(BackendError::unavailable(format!(
                "scripted acquire failure for {connection_string}"
            )));
        }
        if !self.identities.contains_key(connection_string) {
            return Err(BackendError::session(format!(
                "no identity bound for {connection_string}"
            )));
        }
        let session = Arc::new(MemorySession::new(
            connection_string,
            Arc::clone(&self.shared),
        ));
        self.shared
            .sessions
            .lock()
            .expect("session log poisoned")
            .push(Arc::clone(&session));
        debug!(connection = connection_string, "session created");
        Ok(session)
    }
}

/// A session handle backed by in-memory flags.
pub struct MemorySession {
    connection_string: String,
    connected: AtomicBool,
    released: AtomicBool,
    shared: Arc<Shared>,
}

impl MemorySession {
    fn new(connection_string: &str, shared: Arc<Shared>) -> Self {
        Self {
            connection_string: connection_string.to_string(),
            connected: AtomicBool::new(true),
            released: AtomicBool::new(false),
            shared,
        }
    }

    /// Connection string this session was obtained for.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Whether `release` has succeeded on this session.
    pub fn was_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn release(&self) -> Result<(), BackendError> {
        if self.shared.fail_release.contains(&self.connection_string) {
            return Err(BackendError::session(format!(
                "scripted release failure for {}",
                self.connection_string
            )));
        }
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BackendError> {
        if self.shared.fail_disconnect.contains(&self.connection_string) {
            return Err(BackendError::session(format!(
                "scripted disconnect failure for {}",
                self.connection_string
            )));
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
