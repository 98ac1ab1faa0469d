//! Issuance backends
//!
//! Every backend implements [`Issuer`]. The [`IssuerFactory`] maps an
//! issuer's `kind` to the constructor for its backend, and an
//! [`IssuerLookup`] resolves the issuer a certificate request references.
//!
//! # Built-in kinds
//!
//! - `self-signed` - [`SelfSignedIssuer`], an RSA key and a certificate
//!   signed by that same key

mod self_signed;

pub use self_signed::{SelfSignedIssuer, SELF_SIGNED_KIND};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use certsync_common::{CertificateRequest, IssuerDescriptor, Namespace, ObjectKey};

use crate::credential::StoredCredential;

/// Errors produced by issuers and the issuer factory
#[derive(Debug, Error)]
pub enum IssuerError {
    /// No backend registered for the issuer's kind
    #[error("no issuer implementation for kind '{0}'")]
    UnsupportedKind(String),

    /// Backend could not be constructed from the descriptor
    #[error("invalid issuer configuration: {0}")]
    Configuration(String),

    /// Pre-flight setup failed
    #[error("issuer preparation failed: {0}")]
    Preparation(String),

    /// Signing or key generation failed
    #[error("issuance failed: {0}")]
    Issuance(String),
}

/// Certificate and key bytes returned by an issuer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// PEM encoded certificate
    pub certificate: Vec<u8>,
    /// PEM encoded private key
    pub private_key: Vec<u8>,
}

impl From<IssuedCredential> for StoredCredential {
    fn from(issued: IssuedCredential) -> Self {
        StoredCredential::from_parts(issued.certificate, issued.private_key)
    }
}

/// An issuance backend.
#[async_trait]
pub trait Issuer: Send + Sync {
    /// Issuer specific setup that must run on every pass, before the stored
    /// credential is even looked at.
    async fn prepare(&self, request: &CertificateRequest) -> Result<(), IssuerError>;

    /// Produce a new certificate and private key for the request.
    async fn issue(&self, request: &CertificateRequest) -> Result<IssuedCredential, IssuerError>;
}

/// Resolves issuers by name within a namespace.
pub trait IssuerLookup: Send + Sync {
    fn get(&self, namespace: &Namespace, name: &str) -> Option<IssuerDescriptor>;
}

/// In-memory [`IssuerLookup`] holding the current issuer descriptors.
#[derive(Debug, Default)]
pub struct IssuerRegistry {
    issuers: DashMap<ObjectKey, IssuerDescriptor>,
}

impl IssuerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = IssuerDescriptor>) -> Self {
        let registry = Self::new();
        for descriptor in descriptors {
            registry.upsert(descriptor);
        }
        registry
    }

    /// Insert or replace a descriptor
    pub fn upsert(&self, descriptor: IssuerDescriptor) {
        debug!(
            issuer = %descriptor.key(),
            kind = %descriptor.kind,
            ready = descriptor.ready,
            "Registered issuer"
        );
        self.issuers.insert(descriptor.key(), descriptor);
    }

    /// Flip an issuer's readiness. Returns `false` if the issuer is unknown.
    pub fn set_ready(&self, namespace: &Namespace, name: &str, ready: bool) -> bool {
        match self
            .issuers
            .get_mut(&ObjectKey::new(namespace.clone(), name))
        {
            Some(mut descriptor) => {
                descriptor.ready = ready;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, namespace: &Namespace, name: &str) -> Option<IssuerDescriptor> {
        self.issuers
            .remove(&ObjectKey::new(namespace.clone(), name))
            .map(|(_, descriptor)| descriptor)
    }

    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }
}

impl IssuerLookup for IssuerRegistry {
    fn get(&self, namespace: &Namespace, name: &str) -> Option<IssuerDescriptor> {
        self.issuers
            .get(&ObjectKey::new(namespace.clone(), name))
            .map(|entry| entry.value().clone())
    }
}

type IssuerConstructor =
    Arc<dyn Fn(&IssuerDescriptor) -> Result<Arc<dyn Issuer>, IssuerError> + Send + Sync>;

/// Lookup table from issuer kind to backend constructor.
#[derive(Clone, Default)]
pub struct IssuerFactory {
    constructors: HashMap<String, IssuerConstructor>,
}

impl IssuerFactory {
    /// Create a factory with no backends registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory with the built-in backends registered
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register(SELF_SIGNED_KIND, |_| {
            Ok(Arc::new(SelfSignedIssuer::default()) as Arc<dyn Issuer>)
        });
        factory
    }

    /// Register (or replace) the constructor for a kind
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&IssuerDescriptor) -> Result<Arc<dyn Issuer>, IssuerError> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Arc::new(constructor));
    }

    /// Build the backend for an issuer
    pub fn issuer_for(&self, descriptor: &IssuerDescriptor) -> Result<Arc<dyn Issuer>, IssuerError> {
        let constructor = self
            .constructors
            .get(&descriptor.kind)
            .ok_or_else(|| IssuerError::UnsupportedKind(descriptor.kind.clone()))?;
        constructor(descriptor)
    }

    /// Registered kinds, in no particular order
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl fmt::Debug for IssuerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerFactory")
            .field("kinds", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
