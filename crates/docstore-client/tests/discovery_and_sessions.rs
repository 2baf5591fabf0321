//! End-to-end tests of the discovery facade against the scripted in-memory
//! backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docstore_client::model::Entity;
use docstore_client::{Client, ClientError, ClientOptions, Credential};
use docstore_core::{
    BackendError, DocbrokerRow, RepositoryBackend, RepositoryRow, SecureConnectMode, ServerRow,
    Session, SessionManager,
};
use docstore_memory::MemoryBackend;
use pretty_assertions::assert_eq;
use rstest::*;

fn server_row(name: &str, hostname: &str, proximity: i32) -> ServerRow {
    ServerRow {
        name: name.to_string(),
        hostname: hostname.to_string(),
        proximity,
        last_status: Some("Open".to_string()),
    }
}

/// One docbroker on db1:1489, one repository `docbase1` with one server.
#[fixture]
fn scripted() -> (Arc<MemoryBackend>, Client) {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_docbroker("db1", 1489, SecureConnectMode::Native);
    backend.add_repository("010f1", "docbase1", "Test");
    backend.set_servers("docbase1", vec![server_row("docbase1_s1", "db1", 0)]);
    let client = Client::new(Arc::clone(&backend) as Arc<dyn RepositoryBackend>);
    (backend, client)
}

#[rstest]
#[tokio::test]
async fn end_to_end_discovery(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;

    let brokers = client.docbrokers().await.unwrap();
    assert_eq!(brokers.len(), 1);
    assert_eq!(brokers[0].id(), "db1:1489");
    assert_eq!(brokers[0].server().hostname(), "db1");

    let repositories = client.repositories().await.unwrap();
    assert_eq!(repositories.len(), 1);
    assert_eq!(repositories[0].name(), "docbase1");
    assert_eq!(repositories[0].description(), "Test");

    let servers = client.content_servers_for("docbase1").await.unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].connection_string(), "docbase1.docbase1_s1@db1");

    // The whole walk connected the backend exactly once.
    assert_eq!(backend.connect_calls(), 1);
}

#[rstest]
#[tokio::test]
async fn concurrent_first_use_connects_once(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    let (repos, brokers) = tokio::join!(client.repositories(), client.docbrokers());
    repos.unwrap();
    brokers.unwrap();
    assert_eq!(backend.connect_calls(), 1);
}

#[rstest]
#[tokio::test]
async fn identity_binds_once_across_callers(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    let servers = client.content_servers_for("docbase1").await.unwrap();
    let server = &servers[0];

    client
        .session(server, Some(&Credential::new("alice", "a")))
        .await
        .unwrap();
    client
        .session(server, Some(&Credential::new("bob", "b")))
        .await
        .unwrap();
    client.session(server, None).await.unwrap();

    // First bind wins: exactly one bind call for the connection string.
    assert_eq!(
        backend.bind_calls(),
        vec![("docbase1.docbase1_s1@db1".to_string(), "alice".to_string())]
    );
    assert_eq!(backend.managers_created(), 1);
}

#[rstest]
#[tokio::test]
async fn session_for_repository_uses_first_cached_server(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    backend.set_servers(
        "docbase1",
        vec![
            server_row("docbase1_s1", "db1", 0),
            server_row("docbase1_s2", "db2", 1),
        ],
    );

    client
        .session_for_repository("docbase1", Some(&Credential::new("alice", "a")))
        .await
        .unwrap();

    let sessions = backend.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].connection_string(), "docbase1.docbase1_s1@db1");
}

#[rstest]
#[tokio::test]
async fn repository_without_servers_is_no_servers(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    backend.set_servers("docbase1", Vec::new());

    let err = client
        .session_for_repository("docbase1", Some(&Credential::new("alice", "a")))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::NoServers { .. }));
}

#[rstest]
#[tokio::test]
async fn unknown_repository_is_not_found(scripted: (Arc<MemoryBackend>, Client)) {
    let (_backend, client) = scripted;
    let err = client.repository("nosuch").await.unwrap_err();
    match err {
        ClientError::NotFound { kind, name } => {
            assert_eq!(kind, "repository");
            assert_eq!(name, "nosuch");
        }
        other => panic!("expected NotFound, got {other}"),
    }
}

#[rstest]
#[tokio::test]
async fn connect_failure_propagates(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    backend.set_fail_connect(true);
    let err = client.repositories().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Backend(BackendError::Unavailable { .. })
    ));

    // The connection is retried on the next use once the backend recovers.
    backend.set_fail_connect(false);
    assert_eq!(client.repositories().await.unwrap().len(), 1);
}

#[rstest]
#[tokio::test]
async fn bulk_release_is_best_effort(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    backend.set_servers(
        "docbase1",
        vec![
            server_row("docbase1_s1", "h1", 0),
            server_row("docbase1_s2", "h2", 1),
            server_row("docbase1_s3", "h3", 2),
        ],
    );
    let servers = client.content_servers_for("docbase1").await.unwrap();
    let cred = Credential::new("alice", "a");
    for server in &servers {
        client.session(server, Some(&cred)).await.unwrap();
    }
    backend.fail_release_for("docbase1.docbase1_s2@h2");

    // All three get a release attempt despite the failure in the middle.
    let released = client.release_sessions("docbase1", true).await;
    assert_eq!(released, 3);

    // The failed server kept its lease; only it is swept again.
    let released = client.release_sessions("docbase1", true).await;
    assert_eq!(released, 1);
}

#[rstest]
#[tokio::test]
async fn release_for_unknown_repository_is_zero(scripted: (Arc<MemoryBackend>, Client)) {
    let (_backend, client) = scripted;
    assert_eq!(client.release_sessions("nosuch", true).await, 0);
}

#[rstest]
#[tokio::test]
async fn release_all_sessions_sweeps_every_server(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    backend.add_repository("010f2", "docbase2", "");
    backend.set_servers("docbase2", vec![server_row("docbase2_s1", "h9", 0)]);

    let cred = Credential::new("alice", "a");
    client
        .session_for_repository("docbase1", Some(&cred))
        .await
        .unwrap();
    client
        .session_for_repository("docbase2", Some(&cred))
        .await
        .unwrap();

    assert_eq!(client.release_all_sessions(true).await, 2);
    assert_eq!(client.release_all_sessions(true).await, 0);
    for session in backend.sessions() {
        assert!(session.was_released());
        assert!(!session.is_connected().await);
    }
}

#[rstest]
#[tokio::test]
async fn cache_returns_live_handles(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    let before = client.repositories().await.unwrap();
    let handle = Arc::clone(&before[0]);

    backend.add_repository("010f1", "docbase1", "Re-described");
    // The script now reports the repository twice; the second row updates
    // the same cached entity in place.
    let after = client.repositories().await.unwrap();
    assert!(Arc::ptr_eq(&after[0], &handle));
    assert_eq!(handle.description(), "Re-described");
}

#[rstest]
#[tokio::test]
async fn cached_content_servers_need_no_round_trip(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    assert!(client.cached_content_servers().await.is_empty());
    assert_eq!(backend.connect_calls(), 0);

    client.content_servers().await.unwrap();
    let cached = client.cached_content_servers().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].name(), "docbase1_s1");
}

#[rstest]
#[tokio::test]
async fn docbrokers_for_host_filters_by_hostname(scripted: (Arc<MemoryBackend>, Client)) {
    let (backend, client) = scripted;
    backend.add_docbroker("db2", 1489, SecureConnectMode::Native);

    let brokers = client.docbrokers_for_host("DB2").await.unwrap();
    assert_eq!(brokers.len(), 1);
    assert_eq!(brokers[0].id(), "db2:1489");
}

/// Backend that never answers, for exercising the facade timeout hook.
struct StalledBackend;

#[async_trait]
impl RepositoryBackend for StalledBackend {
    async fn connect(&self) -> Result<(), BackendError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn enumerate_docbrokers(&self) -> Result<Vec<DocbrokerRow>, BackendError> {
        Ok(Vec::new())
    }

    async fn enumerate_repositories(&self) -> Result<Vec<RepositoryRow>, BackendError> {
        Ok(Vec::new())
    }

    async fn enumerate_servers(&self, _: &str) -> Result<Vec<ServerRow>, BackendError> {
        Ok(Vec::new())
    }

    async fn new_session_manager(&self) -> Result<Arc<dyn SessionManager>, BackendError> {
        Err(BackendError::unavailable("stalled"))
    }
}

#[tokio::test]
async fn operation_timeout_bounds_the_acquisition_path() {
    let client = Client::with_options(
        Arc::new(StalledBackend),
        ClientOptions {
            operation_timeout: Some(Duration::from_millis(20)),
        },
    );
    let err = client.repositories().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { .. }));
}
