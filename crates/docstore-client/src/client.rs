//! Discovery facade: the single entry point composing the topology cache
//! and the session pool behind a lazily connected backend.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use docstore_core::{BackendError, Credential, RepositoryBackend, Session};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::model::{ContentServer, Docbroker, Entity, Repository};
use crate::pool::SessionPool;
use crate::topology::TopologyCache;

/// Facade configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Upper bound for a single backend round trip on the acquisition path
    /// (discovery, connect, session acquisition). `None` means wait as long
    /// as the backend does. Release/disconnect calls are not bounded; they
    /// are best-effort and already swallow failures.
    pub operation_timeout: Option<Duration>,
}

struct Inner {
    connected: bool,
    topology: TopologyCache,
    pool: SessionPool,
}

/// Client for one repository system.
///
/// All state lives behind a single mutex: every public operation is fully
/// serialized, which is acceptable because the backend round trip, not lock
/// contention, dominates latency. The backend connection is established
/// lazily on first use; the mutex makes a concurrent first use unable to
/// double-initialize.
pub struct Client {
    backend: Arc<dyn RepositoryBackend>,
    options: ClientOptions,
    inner: Mutex<Inner>,
}

impl Client {
    pub fn new(backend: Arc<dyn RepositoryBackend>) -> Self {
        Self::with_options(backend, ClientOptions::default())
    }

    pub fn with_options(backend: Arc<dyn RepositoryBackend>, options: ClientOptions) -> Self {
        let pool = SessionPool::new(Arc::clone(&backend));
        Self {
            backend,
            options,
            inner: Mutex::new(Inner {
                connected: false,
                topology: TopologyCache::new(),
                pool,
            }),
        }
    }

    /// Run one backend round trip under the configured timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        match self.options.operation_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result.map_err(ClientError::from),
                Err(_) => Err(ClientError::Timeout { limit }),
            },
            None => fut.await.map_err(ClientError::from),
        }
    }

    async fn ensure_connected(&self, inner: &mut Inner) -> Result<(), ClientError> {
        if !inner.connected {
            debug!("connecting repository backend");
            self.bounded(self.backend.connect()).await?;
            inner.connected = true;
        }
        Ok(())
    }

    async fn refresh_repositories(&self, inner: &mut Inner) -> Result<(), ClientError> {
        debug!("getting repository map");
        let rows = self.bounded(self.backend.enumerate_repositories()).await?;
        inner.topology.load_repositories(&rows)?;
        Ok(())
    }

    /// Resolve a repository by short name, enumerating when it is not
    /// cached yet.
    async fn resolve_repository(
        &self,
        inner: &mut Inner,
        name: &str,
    ) -> Result<Arc<Repository>, ClientError> {
        if let Some(repository) = inner.topology.repository_by_name(name) {
            return Ok(repository);
        }
        self.refresh_repositories(inner).await?;
        inner.topology.repository_by_name(name).ok_or_else(|| {
            warn!(repository = %name, "unknown repository");
            ClientError::not_found("repository", name)
        })
    }

    /// The docbrokers known to the backend.
    pub async fn docbrokers(&self) -> Result<Vec<Arc<Docbroker>>, ClientError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;
        debug!("getting docbroker map");
        let rows = self.bounded(self.backend.enumerate_docbrokers()).await?;
        Ok(inner.topology.load_docbrokers(&rows)?.to_vec())
    }

    /// The docbrokers on one specific host.
    pub async fn docbrokers_for_host(
        &self,
        hostname: &str,
    ) -> Result<Vec<Arc<Docbroker>>, ClientError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;
        debug!(%hostname, "getting docbroker map for host");
        let rows = self.bounded(self.backend.enumerate_docbrokers()).await?;
        let rows: Vec<_> = rows
            .into_iter()
            .filter(|row| row.hostname.eq_ignore_ascii_case(hostname))
            .collect();
        Ok(inner.topology.load_docbrokers(&rows)?.to_vec())
    }

    /// The repositories reported by the current enumeration. The cache
    /// accumulates across calls; known repositories are updated in place.
    pub async fn repositories(&self) -> Result<Vec<Arc<Repository>>, ClientError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;
        debug!("getting repository map");
        let rows = self.bounded(self.backend.enumerate_repositories()).await?;
        Ok(inner.topology.load_repositories(&rows)?.to_vec())
    }

    /// Look up one repository by short name, refreshing the enumeration
    /// when it is not cached.
    pub async fn repository(&self, name: &str) -> Result<Arc<Repository>, ClientError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;
        self.resolve_repository(&mut inner, name).await
    }

    /// Enumerate every repository's servers and return the full server set.
    pub async fn content_servers(&self) -> Result<Vec<Arc<ContentServer>>, ClientError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;
        debug!("getting content server map");
        let rows = self.bounded(self.backend.enumerate_repositories()).await?;
        let repositories = inner.topology.load_repositories(&rows)?.to_vec();

        let mut all = Vec::new();
        for repository in repositories {
            let server_rows = self
                .bounded(self.backend.enumerate_servers(&repository.name()))
                .await?;
            let servers = inner
                .topology
                .load_content_servers(&repository, &server_rows)?;
            all.extend(servers.to_vec());
        }
        Ok(all)
    }

    /// The content servers already cached, without a backend round trip.
    pub async fn cached_content_servers(&self) -> Vec<Arc<ContentServer>> {
        self.inner.lock().await.topology.content_servers()
    }

    /// The content servers serving one repository.
    pub async fn content_servers_for(
        &self,
        repository_name: &str,
    ) -> Result<Vec<Arc<ContentServer>>, ClientError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;
        let repository = self.resolve_repository(&mut inner, repository_name).await?;
        debug!(repository = %repository.name(), "getting content server map for repository");
        let rows = self
            .bounded(self.backend.enumerate_servers(&repository.name()))
            .await?;
        Ok(inner
            .topology
            .load_content_servers(&repository, &rows)?
            .to_vec())
    }

    /// Obtain a session for a content server, binding `credential` first if
    /// one is given and the server's manager has no identity yet.
    pub async fn session(
        &self,
        server: &Arc<ContentServer>,
        credential: Option<&Credential>,
    ) -> Result<Arc<dyn Session>, ClientError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;
        let fut = inner.pool.session(server, credential);
        self.bounded(fut).await
    }

    /// Obtain a session for a repository through its first cached content
    /// server (lowest ordinal in the enumeration order; callers needing a
    /// specific proximity or failover order must pre-sort by asking for the
    /// server set themselves).
    pub async fn session_for_repository(
        &self,
        repository_name: &str,
        credential: Option<&Credential>,
    ) -> Result<Arc<dyn Session>, ClientError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;
        let repository = self.resolve_repository(&mut inner, repository_name).await?;

        let servers = match inner.topology.servers_for_repository(repository.id()) {
            Some(servers) if !servers.is_empty() => servers,
            _ => {
                let rows = self
                    .bounded(self.backend.enumerate_servers(&repository.name()))
                    .await?;
                inner
                    .topology
                    .load_content_servers(&repository, &rows)?
                    .to_vec()
            }
        };
        let Some(server) = servers.first() else {
            return Err(ClientError::NoServers {
                repository: repository.name(),
            });
        };
        let fut = inner.pool.session(server, credential);
        self.bounded(fut).await
    }

    /// Release the in-flight sessions of one repository's cached server
    /// set, best effort. A repository whose servers were never enumerated
    /// has no sessions to release, so no backend round trip is made on this
    /// path. Returns the number of sessions a release was attempted on.
    pub async fn release_sessions(&self, repository_name: &str, also_disconnect: bool) -> usize {
        let mut inner = self.inner.lock().await;
        let Some(repository) = inner.topology.repository_by_name(repository_name) else {
            warn!(repository = %repository_name, "unknown repository; no sessions to release");
            return 0;
        };
        let servers = inner
            .topology
            .servers_for_repository(repository.id())
            .unwrap_or_default();
        inner.pool.release_sessions(&servers, also_disconnect).await
    }

    /// Release every in-flight session, best effort. Returns the number of
    /// sessions a release was attempted on.
    pub async fn release_all_sessions(&self, also_disconnect: bool) -> usize {
        let mut inner = self.inner.lock().await;
        inner.pool.release_all(also_disconnect).await
    }
}
