//! Reconciliation error types
//!
//! Only hard failures are errors. A stored credential that is missing,
//! corrupt or stale is not an error; it is a
//! [`SelfHealReason`](crate::credential::SelfHealReason) and leads to
//! reissuance.

use thiserror::Error;

use certsync_common::ObjectKey;

use crate::issuer::IssuerError;
use crate::store::StoreError;

/// Hard failures that abort a reconciliation pass
///
/// The caller is expected to retry the request later; nothing in a failed
/// pass affects passes for other requests.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The referenced issuer does not exist
    #[error("issuer '{issuer}' for certificate '{certificate}' does not exist")]
    IssuerNotFound {
        issuer: ObjectKey,
        certificate: ObjectKey,
    },

    /// The referenced issuer exists but is not ready
    #[error("issuer '{issuer}' for certificate '{certificate}' not ready")]
    IssuerNotReady {
        issuer: ObjectKey,
        certificate: ObjectKey,
    },

    /// No backend could be built for the issuer's kind
    #[error("error getting issuer implementation for issuer '{issuer}': {source}")]
    UnsupportedIssuerKind {
        issuer: ObjectKey,
        source: IssuerError,
    },

    /// The issuer's pre-flight setup failed
    #[error("issuer '{issuer}' failed to prepare certificate '{certificate}': {source}")]
    PrepareFailed {
        issuer: ObjectKey,
        certificate: ObjectKey,
        source: IssuerError,
    },

    /// Reading the stored credential failed for a reason other than absence
    #[error("error reading credential '{credential}': {source}")]
    StoreReadFailed {
        credential: ObjectKey,
        source: StoreError,
    },

    /// The issuer could not produce a certificate
    #[error("error issuing certificate '{certificate}': {source}")]
    IssuanceFailed {
        certificate: ObjectKey,
        source: IssuerError,
    },

    /// The issued credential could not be saved
    #[error("error saving credential '{credential}': {source}")]
    PersistFailed {
        credential: ObjectKey,
        source: StoreError,
    },
}

impl ReconcileError {
    /// Short stable label, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::IssuerNotFound { .. } => "issuer_not_found",
            ReconcileError::IssuerNotReady { .. } => "issuer_not_ready",
            ReconcileError::UnsupportedIssuerKind { .. } => "unsupported_issuer_kind",
            ReconcileError::PrepareFailed { .. } => "prepare_failed",
            ReconcileError::StoreReadFailed { .. } => "store_read_failed",
            ReconcileError::IssuanceFailed { .. } => "issuance_failed",
            ReconcileError::PersistFailed { .. } => "persist_failed",
        }
    }
}
