//! Certsync Controller Library
//!
//! Keeps stored TLS credentials in line with declarative certificate
//! requests. Each reconciliation pass resolves the request's issuer, checks
//! the stored credential, and issues a replacement when the credential is
//! missing, corrupt, or covers the wrong domains.
//!
//! - **Reconciliation**: one pass per request, idempotent when nothing changed
//! - **Validation**: PEM/X.509 certificate, PKCS#1 RSA key, domain set match
//! - **Issuers**: pluggable backends selected by kind, self-signed built in
//! - **Stores**: create-only credential persistence, in memory or on disk
//! - **Scheduling**: periodic resync with bounded concurrency
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use certsync_controller::{
//!     IssuerFactory, IssuerRegistry, MemoryCredentialStore, ReconcileContext, Reconciler,
//! };
//!
//! let ctx = ReconcileContext::new(
//!     Arc::new(IssuerRegistry::from_descriptors(config.issuers.clone())),
//!     Arc::new(IssuerFactory::with_builtin()),
//!     Arc::new(MemoryCredentialStore::new()),
//! );
//! let outcome = Reconciler::new(ctx).reconcile(&request).await?;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod credential;
pub mod diagnostics;
pub mod domains;
pub mod error;
pub mod issuer;
pub mod reconcile;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod test_support;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Credential model and validation
pub use credential::{
    validate, ParsedCredential, SelfHealReason, StoredCredential, ValidationPolicy, TLS_CERT_KEY,
    TLS_PRIVATE_KEY_KEY,
};

// Reconciliation
pub use diagnostics::{Diagnostics, TracingDiagnostics};
pub use error::ReconcileError;
pub use reconcile::{Assessment, ReconcileContext, ReconcileOutcome, Reconciler};
pub use scheduler::{ResyncScheduler, SyncSummary};

// Issuers
pub use issuer::{
    IssuedCredential, Issuer, IssuerError, IssuerFactory, IssuerLookup, IssuerRegistry,
    SelfSignedIssuer, SELF_SIGNED_KIND,
};

// Stores
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};
