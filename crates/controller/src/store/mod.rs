//! Credential store implementations.
//!
//! The store is create-only: there is no update path. Reissuing onto a name
//! that already holds a credential requires the old one to be deleted
//! outside the controller first. Two passes racing to create the same
//! credential are told apart by [`StoreError::AlreadyExists`] on the loser.

mod filesystem;
mod memory;

pub use filesystem::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use async_trait::async_trait;
use std::io;
use thiserror::Error;

use certsync_common::{Namespace, ObjectKey};

use crate::credential::StoredCredential;

/// Errors returned by credential stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// No credential stored under the key
    #[error("credential '{0}' not found")]
    NotFound(ObjectKey),

    /// A create targeted a key that already holds a credential
    #[error("credential '{0}' already exists")]
    AlreadyExists(ObjectKey),

    /// IO error in a filesystem backed store
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Read and create access to persisted credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential stored under `name`.
    ///
    /// Returns [`StoreError::NotFound`] when nothing is stored there.
    async fn get(&self, namespace: &Namespace, name: &str)
        -> Result<StoredCredential, StoreError>;

    /// Persist a new credential under `name` with all fields in one write.
    ///
    /// Returns [`StoreError::AlreadyExists`] without touching the existing
    /// credential when the name is taken.
    async fn create(
        &self,
        namespace: &Namespace,
        name: &str,
        credential: StoredCredential,
    ) -> Result<(), StoreError>;
}
