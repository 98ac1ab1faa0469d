//! Certificate reconciliation
//!
//! A pass for one [`CertificateRequest`] runs these steps in order and stops
//! at the first hard failure:
//!
//! 1. resolve the referenced issuer and require it to be ready
//! 2. build the issuer's backend and run its `prepare` hook
//! 3. read the stored credential
//! 4. validate it against the requested domains
//! 5. when it is missing or unusable, issue a new one and create it
//!
//! A pass that finds a usable credential performs no writes, so running it
//! repeatedly is a no-op. A pass never overwrites an existing credential;
//! when the create finds one already stored, the freshly issued one is
//! discarded.

use std::sync::Arc;

use tracing::debug;

use certsync_common::CertificateRequest;

use crate::credential::{self, ParsedCredential, SelfHealReason, ValidationPolicy};
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::error::ReconcileError;
use crate::issuer::{Issuer, IssuerFactory, IssuerLookup};
use crate::store::{CredentialStore, StoreError};

/// Result of a successful pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The stored credential was usable; nothing was written
    Unchanged,
    /// A new credential was issued and saved
    Issued { reason: SelfHealReason },
    /// A new credential was issued but the create found one already stored,
    /// either saved by a concurrent pass or the unusable one that triggered
    /// issuance
    ConcurrentlyIssued { reason: SelfHealReason },
}

impl ReconcileOutcome {
    /// Whether the pass issued a certificate
    pub fn issued(&self) -> bool {
        !matches!(self, ReconcileOutcome::Unchanged)
    }
}

/// What the stored credential means for the pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    /// Usable as is
    Current(ParsedCredential),
    /// Must be replaced
    Reissue(SelfHealReason),
}

/// Collaborators a reconciler needs
#[derive(Clone)]
pub struct ReconcileContext {
    pub issuers: Arc<dyn IssuerLookup>,
    pub factory: Arc<IssuerFactory>,
    pub store: Arc<dyn CredentialStore>,
    pub diagnostics: Arc<dyn Diagnostics>,
    pub policy: ValidationPolicy,
}

impl ReconcileContext {
    /// Context reporting through `tracing` with the default validation policy
    pub fn new(
        issuers: Arc<dyn IssuerLookup>,
        factory: Arc<IssuerFactory>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            issuers,
            factory,
            store,
            diagnostics: Arc::new(TracingDiagnostics),
            policy: ValidationPolicy::default(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Drives reconciliation passes
#[derive(Clone)]
pub struct Reconciler {
    ctx: ReconcileContext,
}

impl Reconciler {
    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ReconcileContext {
        &self.ctx
    }

    /// Run one pass for `request`
    ///
    /// Hard failures are reported to the diagnostic sink before being
    /// returned.
    pub async fn reconcile(
        &self,
        request: &CertificateRequest,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let result = self.run(request).await;
        if let Err(ref e) = result {
            self.ctx.diagnostics.hard_error(request, e);
        }
        result
    }

    async fn run(&self, request: &CertificateRequest) -> Result<ReconcileOutcome, ReconcileError> {
        let issuer = self.prepare_issuer(request).await?;

        match self.assess(request).await? {
            Assessment::Current(parsed) => {
                debug!(
                    certificate = %request.key(),
                    serial = %parsed.serial,
                    not_after = %parsed.not_after,
                    "Stored credential is up to date"
                );
                Ok(ReconcileOutcome::Unchanged)
            }
            Assessment::Reissue(reason) => {
                self.ctx.diagnostics.self_heal(request, &reason);
                self.issue(issuer.as_ref(), request, reason).await
            }
        }
    }

    /// Resolve, build and prepare the request's issuer
    async fn prepare_issuer(
        &self,
        request: &CertificateRequest,
    ) -> Result<Arc<dyn Issuer>, ReconcileError> {
        let issuer_key = request.issuer_key();

        let descriptor = self
            .ctx
            .issuers
            .get(&request.namespace, &request.issuer_ref)
            .ok_or_else(|| ReconcileError::IssuerNotFound {
                issuer: issuer_key.clone(),
                certificate: request.key(),
            })?;

        if !descriptor.ready {
            return Err(ReconcileError::IssuerNotReady {
                issuer: issuer_key,
                certificate: request.key(),
            });
        }

        let issuer = self.ctx.factory.issuer_for(&descriptor).map_err(|source| {
            ReconcileError::UnsupportedIssuerKind {
                issuer: issuer_key.clone(),
                source,
            }
        })?;

        issuer
            .prepare(request)
            .await
            .map_err(|source| ReconcileError::PrepareFailed {
                issuer: issuer_key,
                certificate: request.key(),
                source,
            })?;

        Ok(issuer)
    }

    /// Read the stored credential and decide whether it can be kept
    ///
    /// Absence and every validation failure become
    /// [`Assessment::Reissue`]; only a failed read is an error.
    pub async fn assess(&self, request: &CertificateRequest) -> Result<Assessment, ReconcileError> {
        let stored = match self
            .ctx
            .store
            .get(&request.namespace, &request.secret_name)
            .await
        {
            Ok(stored) => stored,
            Err(StoreError::NotFound(_)) => return Ok(Assessment::Reissue(SelfHealReason::Missing)),
            Err(source) => {
                return Err(ReconcileError::StoreReadFailed {
                    credential: request.secret_key(),
                    source,
                })
            }
        };

        Ok(
            match credential::validate(&stored, &request.domains, &self.ctx.policy) {
                Ok(parsed) => Assessment::Current(parsed),
                Err(reason) => Assessment::Reissue(reason),
            },
        )
    }

    /// Issue a credential for `request` and create it in the store
    ///
    /// An existing credential is never overwritten. Finding one on create
    /// is not an error: it is kept and this issuance is dropped.
    pub async fn issue(
        &self,
        issuer: &dyn Issuer,
        request: &CertificateRequest,
        reason: SelfHealReason,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let issued = issuer
            .issue(request)
            .await
            .map_err(|source| ReconcileError::IssuanceFailed {
                certificate: request.key(),
                source,
            })?;

        match self
            .ctx
            .store
            .create(&request.namespace, &request.secret_name, issued.into())
            .await
        {
            Ok(()) => {
                self.ctx.diagnostics.issued(request, &reason);
                Ok(ReconcileOutcome::Issued { reason })
            }
            Err(StoreError::AlreadyExists(_)) => {
                self.ctx.diagnostics.duplicate_issuance(request, &reason);
                Ok(ReconcileOutcome::ConcurrentlyIssued { reason })
            }
            Err(source) => Err(ReconcileError::PersistFailed {
                credential: request.secret_key(),
                source,
            }),
        }
    }
}
