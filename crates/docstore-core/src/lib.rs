//! Core traits and types for docstore repository backends.
//!
//! This crate defines the abstractions shared between the client and every
//! concrete backend implementation:
//! - `RepositoryBackend`: broker enumeration and session-manager creation
//! - `SessionManager`: per-server credential binding and session acquisition
//! - `Session`: the live handle that is released and disconnected
//! - Row types carried over the broker protocol (`DocbrokerRow`,
//!   `RepositoryRow`, `ServerRow`)

mod backend;
mod error;

pub use backend::{
    Credential, DocbrokerRow, RepositoryBackend, RepositoryRow, SecureConnectMode, ServerRow,
    Session, SessionManager,
};
pub use error::BackendError;
