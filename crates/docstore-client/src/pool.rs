//! Per-server session managers and the single-lease session pool.
//!
//! One session manager exists per content server and is the unit that holds
//! credential identities. The pool keeps the most recently obtained session
//! per server (a single in-flight lease, not N pooled sessions) so bulk
//! release can find and reclaim everything that is out.

use std::collections::HashMap;
use std::sync::Arc;

use docstore_core::{BackendError, Credential, RepositoryBackend, Session, SessionManager};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::model::{ConnectionState, ContentServer, Entity};

struct SessionLease {
    server: Arc<ContentServer>,
    session: Arc<dyn Session>,
}

pub struct SessionPool {
    backend: Arc<dyn RepositoryBackend>,
    /// Server id -> its one session manager.
    managers: HashMap<String, Arc<dyn SessionManager>>,
    /// Server id -> the most recently obtained session, in acquisition
    /// order (drives the iteration order of release-all).
    sessions: IndexMap<String, SessionLease>,
}

impl SessionPool {
    pub fn new(backend: Arc<dyn RepositoryBackend>) -> Self {
        Self {
            backend,
            managers: HashMap::new(),
            sessions: IndexMap::new(),
        }
    }

    /// Get (creating if needed) the session manager for a content server,
    /// binding `credential` if one is supplied and no identity is bound yet
    /// for the server's connection string.
    ///
    /// First bind wins: once an identity is bound, a later call with a
    /// different credential leaves the bound identity untouched, so a
    /// working credential is never clobbered by a possibly-stale one from
    /// an unrelated caller.
    pub async fn session_manager(
        &mut self,
        server: &Arc<ContentServer>,
        credential: Option<&Credential>,
    ) -> Result<Arc<dyn SessionManager>, BackendError> {
        let manager = match self.managers.get(server.id()) {
            Some(manager) => Arc::clone(manager),
            None => {
                debug!(server = %server.name(), "creating session manager");
                let manager = self.backend.new_session_manager().await?;
                self.managers
                    .insert(server.id().to_string(), Arc::clone(&manager));
                manager
            }
        };

        if let Some(credential) = credential {
            let connection = server.connection_string();
            if !manager.has_identity(&connection).await {
                debug!(connection = %connection, login = %credential.login_name, "binding identity");
                manager.bind_identity(&connection, credential).await?;
            }
        }
        Ok(manager)
    }

    /// Obtain a session for a content server and record it as the server's
    /// in-flight lease.
    pub async fn session(
        &mut self,
        server: &Arc<ContentServer>,
        credential: Option<&Credential>,
    ) -> Result<Arc<dyn Session>, BackendError> {
        let manager = self.session_manager(server, credential).await?;
        let connection = server.connection_string();
        server.set_connection_state(ConnectionState::Connecting);
        match manager.get_session(&connection).await {
            Ok(session) => {
                server.set_connection_state(ConnectionState::Connected);
                self.sessions.insert(
                    server.id().to_string(),
                    SessionLease {
                        server: Arc::clone(server),
                        session: Arc::clone(&session),
                    },
                );
                Ok(session)
            }
            Err(err) => {
                server.set_connection_state(ConnectionState::Failed);
                Err(err)
            }
        }
    }

    /// Release the in-flight sessions of the given servers, best effort.
    ///
    /// Servers without a session are skipped (not an error). A failed
    /// release or disconnect is logged and never aborts the loop. Eviction
    /// from the lease map is deferred to after the loop and only applies to
    /// servers whose release succeeded and whose disconnect was requested
    /// and succeeded; everything else keeps its entry for a later retry.
    /// Returns the number of sessions a release was attempted on.
    pub async fn release_sessions(
        &mut self,
        servers: &[Arc<ContentServer>],
        also_disconnect: bool,
    ) -> usize {
        let mut released = 0;
        let mut evict = Vec::new();

        for server in servers {
            let Some(lease) = self.sessions.get(server.id()) else {
                info!(server = %server.name(), "no session for server");
                continue;
            };

            let mut release_ok = true;
            if let Err(err) = lease.session.release().await {
                warn!(server = %server.name(), error = %err, "could not release session");
                release_ok = false;
            }
            released += 1;

            let mut disconnect_ok = false;
            if also_disconnect && lease.session.is_connected().await {
                match lease.session.disconnect().await {
                    Ok(()) => {
                        lease
                            .server
                            .set_connection_state(ConnectionState::Disconnected);
                        disconnect_ok = true;
                    }
                    Err(err) => {
                        warn!(server = %server.name(), error = %err, "could not disconnect session");
                    }
                }
            }

            if release_ok && disconnect_ok {
                evict.push(server.id().to_string());
            }
        }

        for id in evict {
            self.sessions.shift_remove(&id);
        }
        released
    }

    /// Release every in-flight session, in acquisition order.
    pub async fn release_all(&mut self, also_disconnect: bool) -> usize {
        let servers: Vec<Arc<ContentServer>> = self
            .sessions
            .values()
            .map(|lease| Arc::clone(&lease.server))
            .collect();
        self.release_sessions(&servers, also_disconnect).await
    }

    /// Number of servers with an in-flight session.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use docstore_memory::MemoryBackend;

    use super::*;
    use crate::model::Repository;

    fn server(repo: &Arc<Repository>, name: &str, hostname: &str) -> Arc<ContentServer> {
        Arc::new(ContentServer::new(
            Some(Arc::clone(repo)),
            name,
            hostname,
            0,
            Some("Open"),
        ))
    }

    fn fixture() -> (Arc<MemoryBackend>, SessionPool, Arc<ContentServer>) {
        let backend = Arc::new(MemoryBackend::new());
        let pool = SessionPool::new(Arc::clone(&backend) as Arc<dyn RepositoryBackend>);
        let repo = Arc::new(Repository::new("010f1", "docbase1", ""));
        let server = server(&repo, "docbase1_s1", "db1");
        (backend, pool, server)
    }

    #[tokio::test]
    async fn one_manager_per_server() {
        let (backend, mut pool, server) = fixture();
        let first = pool.session_manager(&server, None).await.unwrap();
        let second = pool.session_manager(&server, None).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.managers_created(), 1);
    }

    #[tokio::test]
    async fn first_bind_wins() {
        let (backend, mut pool, server) = fixture();
        let cred_a = Credential::new("alice", "a");
        let cred_b = Credential::new("bob", "b");

        pool.session_manager(&server, Some(&cred_a)).await.unwrap();
        pool.session_manager(&server, Some(&cred_b)).await.unwrap();
        pool.session_manager(&server, None).await.unwrap();

        let calls = backend.bind_calls();
        assert_eq!(
            calls,
            vec![("docbase1.docbase1_s1@db1".to_string(), "alice".to_string())]
        );
    }

    #[tokio::test]
    async fn acquisition_failure_marks_server_failed_and_propagates() {
        let (backend, mut pool, server) = fixture();
        backend.fail_acquire_for("docbase1.docbase1_s1@db1");

        let err = pool
            .session(&server, Some(&Credential::new("alice", "a")))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Unavailable { .. }));
        assert_eq!(server.connection_state(), ConnectionState::Failed);
        assert_eq!(pool.live_sessions(), 0);
    }

    #[tokio::test]
    async fn release_all_evicts_only_fully_reclaimed_leases() {
        let backend = Arc::new(MemoryBackend::new());
        let mut pool = SessionPool::new(Arc::clone(&backend) as Arc<dyn RepositoryBackend>);
        let repo = Arc::new(Repository::new("010f1", "docbase1", ""));
        let cred = Credential::new("alice", "a");

        let s1 = server(&repo, "docbase1_s1", "h1");
        let s2 = server(&repo, "docbase1_s2", "h2");
        let s3 = server(&repo, "docbase1_s3", "h3");
        for s in [&s1, &s2, &s3] {
            pool.session(s, Some(&cred)).await.unwrap();
        }
        backend.fail_release_for("docbase1.docbase1_s2@h2");

        // All three get a release attempt; the failed one keeps its lease.
        let released = pool.release_all(true).await;
        assert_eq!(released, 3);
        assert_eq!(pool.live_sessions(), 1);
        assert_eq!(s1.connection_state(), ConnectionState::Disconnected);
        assert_eq!(s3.connection_state(), ConnectionState::Disconnected);

        // A second sweep only sees the surviving lease.
        let released = pool.release_all(true).await;
        assert_eq!(released, 1);
    }

    #[tokio::test]
    async fn disconnect_failure_keeps_lease() {
        let (backend, mut pool, server) = fixture();
        let cred = Credential::new("alice", "a");
        pool.session(&server, Some(&cred)).await.unwrap();
        backend.fail_disconnect_for("docbase1.docbase1_s1@db1");

        let released = pool.release_all(true).await;
        assert_eq!(released, 1);
        // Release succeeded but disconnect did not: the lease survives.
        assert_eq!(pool.live_sessions(), 1);
        assert_eq!(server.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn release_without_disconnect_keeps_leases() {
        let (_backend, mut pool, server) = fixture();
        let cred = Credential::new("alice", "a");
        pool.session(&server, Some(&cred)).await.unwrap();

        let released = pool.release_all(false).await;
        assert_eq!(released, 1);
        assert_eq!(pool.live_sessions(), 1);
        assert_eq!(pool.release_sessions(&[server], false).await, 1);
    }

    #[tokio::test]
    async fn servers_without_sessions_are_skipped() {
        let (_backend, mut pool, server) = fixture();
        let released = pool.release_sessions(&[server], true).await;
        assert_eq!(released, 0);
    }
}
