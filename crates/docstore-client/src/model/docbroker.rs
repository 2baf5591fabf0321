use std::sync::{Arc, RwLock};

use docstore_core::SecureConnectMode;

use crate::model::content_server::ContentServer;
use crate::model::entity::{Entity, EntityCore};

#[derive(Debug)]
struct DocbrokerState {
    server: Arc<ContentServer>,
    port: u16,
    secure_mode: SecureConnectMode,
}

/// A broker service instance advertising which repositories are reachable
/// through which content servers. Identity key is `{serverId}:{port}`.
#[derive(Debug)]
pub struct Docbroker {
    core: EntityCore,
    state: RwLock<DocbrokerState>,
}

impl Docbroker {
    pub fn new(server: Arc<ContentServer>, port: u16, secure_mode: SecureConnectMode) -> Self {
        let id = Self::id_for(&server, port);
        let name = Self::name_for(&server, port);
        Self {
            core: EntityCore::new(id, name),
            state: RwLock::new(DocbrokerState {
                server,
                port,
                secure_mode,
            }),
        }
    }

    /// Identity key for a docbroker on `server` at `port`.
    pub fn id_for(server: &ContentServer, port: u16) -> String {
        format!("{}:{}", server.id(), port)
    }

    /// Display name for a docbroker on `server` at `port`.
    pub fn name_for(server: &ContentServer, port: u16) -> String {
        format!("{}:{}", server.name(), port)
    }

    fn state(&self) -> std::sync::RwLockReadGuard<'_, DocbrokerState> {
        self.state.read().expect("docbroker state poisoned")
    }

    pub fn server(&self) -> Arc<ContentServer> {
        self.state().server.clone()
    }

    pub fn port(&self) -> u16 {
        self.state().port
    }

    pub fn secure_mode(&self) -> SecureConnectMode {
        self.state().secure_mode
    }

    /// Re-sighting update for the same identity key: refresh the server
    /// handle, port, display name and secure-connect mode in place.
    pub fn update(&self, server: Arc<ContentServer>, port: u16, secure_mode: SecureConnectMode) {
        let name = Self::name_for(&server, port);
        {
            let mut state = self.state.write().expect("docbroker state poisoned");
            state.server = server;
            state.port = port;
            state.secure_mode = secure_mode;
        }
        self.set_name(&name);
    }
}

impl Entity for Docbroker {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_server_id_and_port() {
        let server = Arc::new(ContentServer::placeholder("db1", "db1.company.org"));
        let broker = Docbroker::new(Arc::clone(&server), 1489, SecureConnectMode::Native);
        assert_eq!(broker.id(), "db1:1489");
        assert_eq!(broker.name(), "db1:1489");
        assert_eq!(broker.port(), 1489);
    }

    #[test]
    fn update_refreshes_fields_in_place() {
        let server = Arc::new(ContentServer::placeholder("db1", "db1.company.org"));
        let broker = Docbroker::new(Arc::clone(&server), 1489, SecureConnectMode::Native);
        broker.update(server, 1489, SecureConnectMode::Secure);
        assert_eq!(broker.secure_mode(), SecureConnectMode::Secure);
        assert_eq!(broker.id(), "db1:1489");
    }
}
