//! Filesystem credential store
//!
//! # Directory Structure
//!
//! ```text
//! storage/
//! └── <namespace>/
//!     └── <name>/
//!         ├── tls.crt       # Certificate (PEM)
//!         └── tls.key       # Private key (PEM, 0600)
//! ```
//!
//! A credential is written into a hidden staging directory next to its
//! final location and renamed into place, so readers never observe a
//! half-written credential and a create onto an existing one fails without
//! modifying it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use certsync_common::{Namespace, ObjectKey};

use super::{CredentialStore, StoreError};
use crate::credential::{StoredCredential, TLS_PRIVATE_KEY_KEY};

/// Credential store backed by a directory tree
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    /// Base storage directory
    base_path: PathBuf,
}

impl FileCredentialStore {
    /// Create a new store rooted at the given path
    ///
    /// Creates the directory if it doesn't exist and sets restrictive
    /// permissions (0700 on Unix).
    pub fn new(base_path: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(base_path)?;
        restrict_dir(base_path)?;

        info!(
            storage_path = %base_path.display(),
            "Initialized credential storage"
        );

        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    /// Get the storage base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding one credential
    fn credential_path(&self, namespace: &Namespace, name: &str) -> Result<PathBuf, StoreError> {
        check_component(namespace.as_str())?;
        check_component(name)?;
        Ok(self.base_path.join(namespace.as_str()).join(name))
    }

    fn load(&self, namespace: &Namespace, name: &str) -> Result<StoredCredential, StoreError> {
        let path = self.credential_path(namespace, name)?;
        let key = ObjectKey::new(namespace.clone(), name);

        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(credential = %key, "No stored credential found");
                return Err(StoreError::NotFound(key));
            }
            Err(e) => return Err(e.into()),
        };

        let mut credential = StoredCredential::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(field) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if field.starts_with('.') {
                continue;
            }
            credential.insert(field, fs::read(entry.path())?);
        }

        debug!(
            credential = %key,
            fields = credential.iter().count(),
            "Loaded stored credential"
        );
        Ok(credential)
    }

    fn store(
        &self,
        namespace: &Namespace,
        name: &str,
        credential: &StoredCredential,
    ) -> Result<(), StoreError> {
        let target = self.credential_path(namespace, name)?;
        let key = ObjectKey::new(namespace.clone(), name);

        if target.exists() {
            return Err(StoreError::AlreadyExists(key));
        }

        let namespace_path = self.base_path.join(namespace.as_str());
        fs::create_dir_all(&namespace_path)?;
        restrict_dir(&namespace_path)?;

        let staging = namespace_path.join(format!(".staging-{}-{}", name, Uuid::new_v4()));
        fs::create_dir(&staging)?;
        restrict_dir(&staging)?;

        if let Err(e) = write_fields(&staging, credential) {
            discard_staging(&staging);
            return Err(e.into());
        }

        match fs::rename(&staging, &target) {
            Ok(()) => {
                info!(credential = %key, "Saved credential to storage");
                Ok(())
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty
                ) =>
            {
                discard_staging(&staging);
                Err(StoreError::AlreadyExists(key))
            }
            Err(e) => {
                discard_staging(&staging);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(
        &self,
        namespace: &Namespace,
        name: &str,
    ) -> Result<StoredCredential, StoreError> {
        let store = self.clone();
        let namespace = namespace.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || store.load(&namespace, &name))
            .await
            .map_err(|e| StoreError::Backend(format!("storage task failed: {}", e)))?
    }

    async fn create(
        &self,
        namespace: &Namespace,
        name: &str,
        credential: StoredCredential,
    ) -> Result<(), StoreError> {
        let store = self.clone();
        let namespace = namespace.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || store.store(&namespace, &name, &credential))
            .await
            .map_err(|e| StoreError::Backend(format!("storage task failed: {}", e)))?
    }
}

/// Reject names that would escape the storage tree or collide with staging
/// directories
fn check_component(component: &str) -> Result<(), StoreError> {
    if component.is_empty()
        || component.starts_with('.')
        || component.contains(['/', '\\'])
        || component.contains('\0')
    {
        return Err(StoreError::Backend(format!(
            "invalid storage name: {:?}",
            component
        )));
    }
    Ok(())
}

fn write_fields(dir: &Path, credential: &StoredCredential) -> io::Result<()> {
    for (field, value) in credential.iter() {
        let path = dir.join(field);
        fs::write(&path, value)?;

        // Private key readable by owner only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if field == TLS_PRIVATE_KEY_KEY {
                fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
            }
        }
    }
    Ok(())
}

fn restrict_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn discard_staging(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging) {
        warn!(
            path = %staging.display(),
            error = %e,
            "Failed to remove staging directory"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::TLS_CERT_KEY;
    use tempfile::TempDir;

    fn setup_storage() -> (TempDir, FileCredentialStore) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileCredentialStore::new(temp_dir.path()).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_storage_creation() {
        let (_temp_dir, storage) = setup_storage();
        assert!(storage.base_path().exists());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_temp_dir, storage) = setup_storage();

        let err = storage
            .get(&Namespace::default(), "site-tls")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (_temp_dir, storage) = setup_storage();
        let ns = Namespace::new("prod");

        storage
            .create(&ns, "site-tls", StoredCredential::from_parts("cert", "key"))
            .await
            .unwrap();

        let dir = storage.base_path().join("prod").join("site-tls");
        assert!(dir.join(TLS_CERT_KEY).is_file());
        assert!(dir.join(TLS_PRIVATE_KEY_KEY).is_file());

        let loaded = storage.get(&ns, "site-tls").await.unwrap();
        assert_eq!(loaded, StoredCredential::from_parts("cert", "key"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp_dir, storage) = setup_storage();
        let ns = Namespace::default();

        storage
            .create(&ns, "site-tls", StoredCredential::from_parts("cert", "key"))
            .await
            .unwrap();

        let key_path = storage
            .base_path()
            .join("default")
            .join("site-tls")
            .join(TLS_PRIVATE_KEY_KEY);
        let mode = fs::metadata(key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_create_never_overwrites() {
        let (_temp_dir, storage) = setup_storage();
        let ns = Namespace::default();

        storage
            .create(&ns, "site-tls", StoredCredential::from_parts("first", "key"))
            .await
            .unwrap();
        let err = storage
            .create(&ns, "site-tls", StoredCredential::from_parts("second", "key"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists(_)));
        let loaded = storage.get(&ns, "site-tls").await.unwrap();
        assert_eq!(loaded.certificate(), Some(&b"first"[..]));

        // No staging leftovers
        let leftovers: Vec<_> = fs::read_dir(storage.base_path().join("default"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staging"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_partial_credential_is_loaded_as_is() {
        let (_temp_dir, storage) = setup_storage();
        let dir = storage.base_path().join("default").join("site-tls");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(TLS_CERT_KEY), "cert").unwrap();

        let loaded = storage
            .get(&Namespace::default(), "site-tls")
            .await
            .unwrap();
        assert_eq!(loaded.certificate(), Some(&b"cert"[..]));
        assert_eq!(loaded.private_key(), None);
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (_temp_dir, storage) = setup_storage();

        let err = storage
            .get(&Namespace::default(), "../etc")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));

        let err = storage
            .create(
                &Namespace::new("a/b"),
                "site-tls",
                StoredCredential::from_parts("cert", "key"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
