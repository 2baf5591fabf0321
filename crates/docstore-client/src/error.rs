//! Error types for the client crate.

use std::time::Duration;

use docstore_core::BackendError;

use crate::model::AttrType;

/// Local, programming-error-level failures of the attribute model and the
/// identity-keyed collections. These never cross the backend boundary.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A value's runtime type disagrees with the attribute's declared type.
    #[error("attribute {attribute}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        attribute: String,
        expected: AttrType,
        actual: AttrType,
    },

    /// An attribute slot with this name already exists on the entity.
    #[error("attribute {attribute} already exists")]
    DuplicateAttribute { attribute: String },

    /// An entity with a blank identity key was inserted into a collection.
    #[error("entity key is blank")]
    BlankKey,

    /// An entity's attribute shape differs from the shape a strict
    /// collection was fixed to by its first insert.
    #[error("attribute schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },
}

/// Errors surfaced by the [`Client`](crate::Client) facade.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A repository or content server was queried by a name the cache and
    /// the backend do not know.
    #[error("unknown {kind}: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A repository has no content servers to connect through.
    #[error("no content servers for repository {repository}")]
    NoServers { repository: String },

    /// The backend failed on the acquisition path.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Backend rows violated a model invariant (blank identity key).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The configured per-operation timeout elapsed.
    #[error("operation timed out after {limit:?}")]
    Timeout { limit: Duration },
}

impl ClientError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}
