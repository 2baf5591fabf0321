//! Repository topology cache and session pool for docstore backends.
//!
//! This crate is the client side of a document-repository system. Given a
//! [`RepositoryBackend`](docstore_core::RepositoryBackend) collaborator it
//! provides:
//! - `model`: typed attribute bags, entity kinds (repository, content
//!   server, docbroker) and identity-keyed collections
//! - [`TopologyCache`]: dedup/update-in-place caching of everything the
//!   broker protocol reports
//! - [`SessionPool`]: one session manager per content server with
//!   first-bind-wins credential identities and best-effort bulk release
//! - [`Client`]: the discovery facade composing the above behind a single
//!   lazily-connected entry point

pub mod client;
pub mod error;
pub mod model;
pub mod pool;
pub mod topology;

pub use client::{Client, ClientOptions};
pub use error::{ClientError, ModelError};
pub use pool::SessionPool;
pub use topology::TopologyCache;

// Re-export the backend-facing types callers need to construct credentials
// and drive sessions without naming the core crate.
pub use docstore_core::{
    BackendError, Credential, DocbrokerRow, RepositoryBackend, RepositoryRow, SecureConnectMode,
    ServerRow, Session, SessionManager,
};
