//! Diagnostic sink for reconciliation passes
//!
//! The reconciler reports what it decided through [`Diagnostics`] and never
//! reads anything back. [`TracingDiagnostics`] turns the reports into
//! structured `tracing` events.

use tracing::{error, info, warn};

use certsync_common::CertificateRequest;

use crate::credential::SelfHealReason;
use crate::error::ReconcileError;

/// One-way sink for reconciliation events
pub trait Diagnostics: Send + Sync {
    /// The stored credential can't be used and will be reissued
    fn self_heal(&self, request: &CertificateRequest, reason: &SelfHealReason);

    /// A new credential was issued and saved
    fn issued(&self, request: &CertificateRequest, reason: &SelfHealReason);

    /// The create found a credential already stored and this issuance was
    /// dropped. With [`SelfHealReason::Missing`] another pass won the race;
    /// otherwise the unusable credential is still in place.
    fn duplicate_issuance(&self, request: &CertificateRequest, reason: &SelfHealReason);

    /// The pass failed
    fn hard_error(&self, request: &CertificateRequest, error: &ReconcileError);
}

/// Reports events as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn self_heal(&self, request: &CertificateRequest, reason: &SelfHealReason) {
        match reason {
            SelfHealReason::Missing => info!(
                certificate = %request.key(),
                secret = %request.secret_name,
                reason = reason.as_str(),
                "Credential does not exist, issuing"
            ),
            _ => warn!(
                certificate = %request.key(),
                secret = %request.secret_name,
                reason = reason.as_str(),
                detail = %reason,
                "Stored credential is unusable, reissuing"
            ),
        }
    }

    fn issued(&self, request: &CertificateRequest, reason: &SelfHealReason) {
        info!(
            certificate = %request.key(),
            secret = %request.secret_name,
            issuer = %request.issuer_ref,
            reason = reason.as_str(),
            "Issued and saved credential"
        );
    }

    fn duplicate_issuance(&self, request: &CertificateRequest, reason: &SelfHealReason) {
        match reason {
            SelfHealReason::Missing => info!(
                certificate = %request.key(),
                secret = %request.secret_name,
                "Credential was created concurrently by another pass, discarding this issuance"
            ),
            _ => warn!(
                certificate = %request.key(),
                secret = %request.secret_name,
                reason = reason.as_str(),
                "Existing credential cannot be replaced (create-only), delete it to reissue"
            ),
        }
    }

    fn hard_error(&self, request: &CertificateRequest, err: &ReconcileError) {
        error!(
            certificate = %request.key(),
            kind = err.kind(),
            error = %err,
            "Reconciliation failed"
        );
    }
}
