//! Declarative resource types shared by configuration and the controller.

use serde::{Deserialize, Serialize};

use crate::ids::{Namespace, ObjectKey};

/// Desired state for one TLS credential.
///
/// Owned by whatever produces requests (configuration, a resource watcher).
/// A reconciliation pass only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    /// Scope for issuer and credential lookups
    #[serde(default)]
    pub namespace: Namespace,
    /// Name of the request itself (used for logging)
    pub name: String,
    /// Name of the issuer that signs this certificate
    pub issuer_ref: String,
    /// Name of the stored credential that receives the certificate and key
    pub secret_name: String,
    /// Hostnames the certificate must cover. Order is irrelevant.
    pub domains: Vec<String>,
}

impl CertificateRequest {
    /// Key of the request object
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Key of the stored credential this request targets
    pub fn secret_key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.secret_name.clone())
    }

    /// Key of the referenced issuer
    pub fn issuer_key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.issuer_ref.clone())
    }
}

/// A configured issuance backend and its readiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerDescriptor {
    #[serde(default)]
    pub namespace: Namespace,
    pub name: String,
    /// Whether the issuer can currently sign certificates
    #[serde(default)]
    pub ready: bool,
    /// Selects the issuance backend (e.g. "self-signed")
    pub kind: String,
}

impl IssuerDescriptor {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}
