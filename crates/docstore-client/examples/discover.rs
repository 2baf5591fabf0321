//! Walk a scripted repository system: discover its topology, open a
//! session, and release everything on the way out.
//!
//! Run with `RUST_LOG=debug` to watch the cache and pool at work.

use std::sync::Arc;

use docstore_client::model::Entity;
use docstore_client::{Client, Credential, RepositoryBackend};
use docstore_core::{SecureConnectMode, ServerRow};
use docstore_memory::MemoryBackend;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let backend = Arc::new(MemoryBackend::new());
    backend.add_docbroker("db1.example.org", 1489, SecureConnectMode::Native);
    backend.add_repository("010f1", "docbase1", "Example repository");
    backend.set_servers(
        "docbase1",
        vec![
            ServerRow {
                name: "docbase1_s1".to_string(),
                hostname: "db1.example.org".to_string(),
                proximity: 0,
                last_status: Some("Open".to_string()),
            },
            ServerRow {
                name: "docbase1_s2".to_string(),
                hostname: "db2.example.org".to_string(),
                proximity: 10,
                last_status: Some("Open".to_string()),
            },
        ],
    );

    let client = Client::new(Arc::clone(&backend) as Arc<dyn RepositoryBackend>);

    let brokers = client.docbrokers().await?;
    let repositories = client.repositories().await?;
    let servers = client.content_servers_for("docbase1").await?;

    let session = client
        .session_for_repository("docbase1", Some(&Credential::new("dmadmin", "secret")))
        .await?;
    let connected = session.is_connected().await;
    let released = client.release_all_sessions(true).await;

    let summary = json!({
        "docbrokers": brokers.iter().map(|b| b.id().to_string()).collect::<Vec<_>>(),
        "repositories": repositories
            .iter()
            .map(|r| json!({ "id": r.id(), "name": r.name(), "description": r.description() }))
            .collect::<Vec<_>>(),
        "servers": servers
            .iter()
            .map(|s| json!({
                "connection_string": s.connection_string(),
                "proximity": s.proximity(),
                "status": s.last_status(),
            }))
            .collect::<Vec<_>>(),
        "session_was_connected": connected,
        "sessions_released": released,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
