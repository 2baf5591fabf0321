//! Three-level topology cache: docbrokers, repositories, content servers.
//!
//! The backend exposes topology incrementally (a broker enumerates
//! docbrokers; a repository enumeration separately yields servers) and
//! callers query at different granularities, so three interlinked
//! directories are kept plus a hostname dedup map for servers sighted on a
//! broker before any repository claims them. Entities are created once and
//! mutated in place on re-sighting; callers hold live handles.

use std::collections::HashMap;
use std::sync::Arc;

use docstore_core::{DocbrokerRow, RepositoryRow, ServerRow};
use tracing::debug;

use crate::error::ModelError;
use crate::model::{ContentServer, Docbroker, Entity, EntityMap, Repository};

#[derive(Default)]
pub struct TopologyCache {
    /// Hostname -> server, for servers seen without a repository context.
    hosts_by_hostname: HashMap<String, Arc<ContentServer>>,
    /// The canonical server directory, keyed by server name.
    servers_by_name: EntityMap<ContentServer>,
    /// The canonical repository directory, keyed by repository id.
    repositories_by_id: EntityMap<Repository>,
    /// Short-name index into `repositories_by_id`.
    repository_ids_by_name: HashMap<String, String>,
    /// Docbrokers keyed by `{serverId}:{port}`.
    docbrokers_by_id: EntityMap<Docbroker>,
    /// Repository id -> the server names its last enumeration reported,
    /// in enumeration order. Backs per-repository lookups and the
    /// stale-hostname eviction pass.
    repo_servers: HashMap<String, Vec<String>>,
}

impl TopologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached server for `hostname`, or create and cache a
    /// placeholder (no repository, proximity unknown). Idempotent: the same
    /// hostname never yields two identities.
    ///
    /// Without a `name_hint` the server name is derived from the hostname's
    /// leading label (`server1.company.org` -> `server1`).
    pub fn resolve_server_by_hostname(
        &mut self,
        hostname: &str,
        name_hint: Option<&str>,
    ) -> Arc<ContentServer> {
        if let Some(server) = self.hosts_by_hostname.get(hostname) {
            return Arc::clone(server);
        }
        let name = match name_hint {
            Some(hint) => hint.to_string(),
            None => hostname
                .split('.')
                .next()
                .unwrap_or(hostname)
                .to_string(),
        };
        let server = Arc::new(ContentServer::placeholder(&name, hostname));
        debug!(%hostname, name = %name, "caching placeholder content server");
        self.hosts_by_hostname
            .insert(hostname.to_string(), Arc::clone(&server));
        server
    }

    /// Fold backend-reported repository rows into the cache and return the
    /// delta map of repositories seen in this call. The cache accumulates
    /// across calls; known ids are updated in place (last write wins).
    pub fn load_repositories(
        &mut self,
        rows: &[RepositoryRow],
    ) -> Result<EntityMap<Repository>, ModelError> {
        let mut delta = EntityMap::new();
        for row in rows {
            debug!(id = %row.id, name = %row.name, "repository row");
            let repository = match self.repositories_by_id.get(&row.id).map(Arc::clone) {
                Some(existing) => {
                    let old_name = existing.name();
                    if old_name != row.name {
                        self.repository_ids_by_name.remove(&old_name);
                    }
                    existing.update_from_row(row);
                    existing
                }
                None => {
                    let repository = Arc::new(Repository::from_row(row));
                    self.repositories_by_id.insert(Arc::clone(&repository))?;
                    repository
                }
            };
            self.repository_ids_by_name
                .insert(row.name.clone(), row.id.clone());
            delta.insert(repository)?;
        }
        Ok(delta)
    }

    /// Rebuild the server directory for one repository from backend rows.
    ///
    /// Hostname bindings of the repository's prior server set are evicted
    /// first (only where they still point at the prior identity), so a
    /// hostname lookup can never return a server the repository's
    /// re-enumeration no longer reports. Servers already known by name are
    /// updated in place; prior servers absent from the new rows are dropped
    /// from the by-name directory as well.
    pub fn load_content_servers(
        &mut self,
        repository: &Arc<Repository>,
        rows: &[ServerRow],
    ) -> Result<EntityMap<ContentServer>, ModelError> {
        if let Some(prior) = self.repo_servers.get(repository.id()) {
            for server_name in prior {
                if let Some(server) = self.servers_by_name.get(server_name) {
                    let hostname = server.hostname();
                    let still_bound = self
                        .hosts_by_hostname
                        .get(&hostname)
                        .is_some_and(|cached| Arc::ptr_eq(cached, server));
                    if still_bound {
                        self.hosts_by_hostname.remove(&hostname);
                    }
                }
            }
        }

        let mut server_map = EntityMap::new();
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let server = match self.servers_by_name.get(&row.name).map(Arc::clone) {
                Some(existing) => {
                    existing.update_from_row(row);
                    existing
                }
                None => {
                    let server = Arc::new(ContentServer::from_row(Arc::clone(repository), row));
                    self.servers_by_name.insert(Arc::clone(&server))?;
                    server
                }
            };
            debug!(server = %server, repository = %repository.name(), "content server cached");
            self.hosts_by_hostname
                .insert(server.hostname(), Arc::clone(&server));
            server_map.insert(Arc::clone(&server))?;
            names.push(row.name.clone());
        }

        if let Some(prior) = self
            .repo_servers
            .insert(repository.id().to_string(), names.clone())
        {
            for stale in prior.iter().filter(|name| !names.contains(*name)) {
                debug!(server = %stale, repository = %repository.name(), "evicting re-enumerated-away server");
                self.servers_by_name.remove(stale);
            }
        }
        Ok(server_map)
    }

    /// Resolve-or-update docbrokers by their `{serverId}:{port}` key and
    /// return the delta map for this call. The server each broker runs on
    /// is resolved through the hostname cache.
    pub fn load_docbrokers(
        &mut self,
        rows: &[DocbrokerRow],
    ) -> Result<EntityMap<Docbroker>, ModelError> {
        let mut delta = EntityMap::new();
        for row in rows {
            let server = self.resolve_server_by_hostname(&row.hostname, None);
            let id = Docbroker::id_for(&server, row.port);
            let docbroker = match self.docbrokers_by_id.get(&id).map(Arc::clone) {
                Some(existing) => {
                    existing.update(server, row.port, row.secure_mode);
                    existing
                }
                None => {
                    let docbroker = Arc::new(Docbroker::new(server, row.port, row.secure_mode));
                    self.docbrokers_by_id.insert(Arc::clone(&docbroker))?;
                    docbroker
                }
            };
            delta.insert(docbroker)?;
        }
        Ok(delta)
    }

    /// Repository lookup by short name.
    pub fn repository_by_name(&self, name: &str) -> Option<Arc<Repository>> {
        let id = self.repository_ids_by_name.get(name)?;
        self.repositories_by_id.get(id).map(Arc::clone)
    }

    /// The cached server set of a repository, in enumeration order.
    /// `None` when the repository's servers were never enumerated.
    pub fn servers_for_repository(&self, repository_id: &str) -> Option<Vec<Arc<ContentServer>>> {
        let names = self.repo_servers.get(repository_id)?;
        Some(
            names
                .iter()
                .filter_map(|name| self.servers_by_name.get(name).map(Arc::clone))
                .collect(),
        )
    }

    /// All cached repositories.
    pub fn repositories(&self) -> Vec<Arc<Repository>> {
        self.repositories_by_id.to_vec()
    }

    /// All cached content servers (placeholders excluded).
    pub fn content_servers(&self) -> Vec<Arc<ContentServer>> {
        self.servers_by_name.to_vec()
    }

    /// All cached docbrokers.
    pub fn docbrokers(&self) -> Vec<Arc<Docbroker>> {
        self.docbrokers_by_id.to_vec()
    }
}
