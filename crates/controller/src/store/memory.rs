//! In-memory credential store.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use certsync_common::{Namespace, ObjectKey};

use super::{CredentialStore, StoreError};
use crate::credential::StoredCredential;

/// Process-local credential store.
///
/// Creates go through the map's entry API, so two concurrent creates for the
/// same key can never both succeed.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: DashMap<ObjectKey, StoredCredential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a credential directly, replacing whatever is there.
    ///
    /// Stands in for an operator or another system writing the store; the
    /// controller itself only ever creates.
    pub fn put(&self, namespace: &Namespace, name: &str, credential: StoredCredential) {
        self.credentials
            .insert(ObjectKey::new(namespace.clone(), name), credential);
    }

    /// Remove a credential, returning it if it existed
    pub fn remove(&self, namespace: &Namespace, name: &str) -> Option<StoredCredential> {
        self.credentials
            .remove(&ObjectKey::new(namespace.clone(), name))
            .map(|(_, credential)| credential)
    }

    /// Number of stored credentials
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(
        &self,
        namespace: &Namespace,
        name: &str,
    ) -> Result<StoredCredential, StoreError> {
        let key = ObjectKey::new(namespace.clone(), name);
        match self.credentials.get(&key) {
            Some(credential) => {
                trace!(credential = %key, "Loaded credential from memory");
                Ok(credential.clone())
            }
            None => Err(StoreError::NotFound(key)),
        }
    }

    async fn create(
        &self,
        namespace: &Namespace,
        name: &str,
        credential: StoredCredential,
    ) -> Result<(), StoreError> {
        let key = ObjectKey::new(namespace.clone(), name);
        match self.credentials.entry(key.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(key)),
            Entry::Vacant(slot) => {
                slot.insert(credential);
                debug!(credential = %key, "Created credential in memory");
                Ok(())
            }
        }
    }
}
