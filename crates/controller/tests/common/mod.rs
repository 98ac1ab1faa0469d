//! Shared fakes and fixtures for reconciliation tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use rsa::pkcs1::der::asn1::UintRef;
use rsa::pkcs1::der::{Decode, Encode};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use tokio::sync::Barrier;

use certsync_common::{CertificateRequest, IssuerDescriptor, Namespace};
use certsync_controller::{
    CredentialStore, Diagnostics, IssuedCredential, Issuer, IssuerError, IssuerFactory,
    IssuerRegistry, MemoryCredentialStore, ReconcileContext, ReconcileError, Reconciler,
    SelfHealReason, StoreError, StoredCredential,
};

// ============================================================================
// Fixtures
// ============================================================================

fn rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap())
}

/// Self-signed certificate PEM covering `names`
pub fn certificate_pem(names: &[&str]) -> String {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let params =
        rcgen::CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
            .unwrap();
    params.self_signed(&key_pair).unwrap().pem()
}

/// PKCS#1 `RSA PRIVATE KEY` PEM
pub fn key_pem() -> String {
    rsa_key()
        .to_pkcs1_pem(LineEnding::LF)
        .unwrap()
        .as_str()
        .to_owned()
}

/// PKCS#1 key that decodes but whose public exponent no longer matches the
/// private exponent
pub fn inconsistent_key_pem() -> String {
    let der = rsa_key().to_pkcs1_der().unwrap();
    let mut key = rsa::pkcs1::RsaPrivateKey::from_der(der.as_bytes()).unwrap();
    key.public_exponent = UintRef::new(&[3]).unwrap();
    pem::encode(&pem::Pem::new("RSA PRIVATE KEY", key.to_der().unwrap()))
}

/// Well-formed credential covering `names`
pub fn valid_credential(names: &[&str]) -> StoredCredential {
    StoredCredential::from_parts(certificate_pem(names), key_pem())
}

pub fn request(domains: &[&str]) -> CertificateRequest {
    CertificateRequest {
        namespace: Namespace::new("prod"),
        name: "site".to_string(),
        issuer_ref: "prod-ca".to_string(),
        secret_name: "site-tls".to_string(),
        domains: domains.iter().map(|d| d.to_string()).collect(),
    }
}

pub fn issuer_descriptor(ready: bool) -> IssuerDescriptor {
    IssuerDescriptor {
        namespace: Namespace::new("prod"),
        name: "prod-ca".to_string(),
        ready,
        kind: FAKE_KIND.to_string(),
    }
}

// ============================================================================
// Call log
// ============================================================================

/// Ordered record of calls into the fakes, shared between them
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

// ============================================================================
// Fake store
// ============================================================================

/// Memory store that records calls and can be told to fail
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryCredentialStore,
    pub log: CallLog,
    pub gets: AtomicUsize,
    pub creates: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_creates: AtomicBool,
    pub created: Mutex<Vec<(Namespace, String, StoredCredential)>>,
}

impl RecordingStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for RecordingStore {
    async fn get(&self, namespace: &Namespace, name: &str) -> Result<StoredCredential, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("store.get {}/{}", namespace, name));
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".to_string()));
        }
        self.inner.get(namespace, name).await
    }

    async fn create(
        &self,
        namespace: &Namespace,
        name: &str,
        credential: StoredCredential,
    ) -> Result<(), StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("store.create {}/{}", namespace, name));
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("quota exceeded".to_string()));
        }
        self.inner
            .create(namespace, name, credential.clone())
            .await?;
        self.created
            .lock()
            .push((namespace.clone(), name.to_string(), credential));
        Ok(())
    }
}

// ============================================================================
// Fake issuer
// ============================================================================

pub const FAKE_KIND: &str = "fake";

/// Issuer returning a fixed credential
pub struct FakeIssuer {
    pub log: CallLog,
    pub credential: IssuedCredential,
    pub issued: Mutex<Vec<CertificateRequest>>,
    pub prepares: AtomicUsize,
    pub fail_prepare: AtomicBool,
    pub fail_issue: AtomicBool,
    /// Holds every issuance until this many passes are issuing at once
    pub gate: Option<Barrier>,
}

impl FakeIssuer {
    pub fn new(log: CallLog, credential: IssuedCredential) -> Self {
        Self {
            log,
            credential,
            issued: Mutex::new(Vec::new()),
            prepares: AtomicUsize::new(0),
            fail_prepare: AtomicBool::new(false),
            fail_issue: AtomicBool::new(false),
            gate: None,
        }
    }

    pub fn with_gate(mut self, passes: usize) -> Self {
        self.gate = Some(Barrier::new(passes));
        self
    }

    pub fn issue_count(&self) -> usize {
        self.issued.lock().len()
    }
}

#[async_trait]
impl Issuer for FakeIssuer {
    async fn prepare(&self, request: &CertificateRequest) -> Result<(), IssuerError> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("issuer.prepare {}", request.key()));
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err(IssuerError::Preparation("CA unreachable".to_string()));
        }
        Ok(())
    }

    async fn issue(&self, request: &CertificateRequest) -> Result<IssuedCredential, IssuerError> {
        self.issued.lock().push(request.clone());
        self.log.push(format!("issuer.issue {}", request.key()));
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        if self.fail_issue.load(Ordering::SeqCst) {
            return Err(IssuerError::Issuance("signing refused".to_string()));
        }
        Ok(self.credential.clone())
    }
}

// ============================================================================
// Recording diagnostics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SelfHeal(&'static str),
    Issued(&'static str),
    DuplicateIssuance(&'static str),
    HardError(&'static str),
}

#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<Event>>,
}

impl RecordingDiagnostics {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn self_heal(&self, _request: &CertificateRequest, reason: &SelfHealReason) {
        self.events.lock().push(Event::SelfHeal(reason.as_str()));
    }

    fn issued(&self, _request: &CertificateRequest, reason: &SelfHealReason) {
        self.events.lock().push(Event::Issued(reason.as_str()));
    }

    fn duplicate_issuance(&self, _request: &CertificateRequest, reason: &SelfHealReason) {
        self.events
            .lock()
            .push(Event::DuplicateIssuance(reason.as_str()));
    }

    fn hard_error(&self, _request: &CertificateRequest, error: &ReconcileError) {
        self.events.lock().push(Event::HardError(error.kind()));
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A reconciler wired to fakes, with handles to inspect them
pub struct Harness {
    pub log: CallLog,
    pub registry: Arc<IssuerRegistry>,
    pub store: Arc<RecordingStore>,
    pub issuer: Arc<FakeIssuer>,
    pub diagnostics: Arc<RecordingDiagnostics>,
    pub reconciler: Reconciler,
}

impl Harness {
    /// Ready issuer handing out a valid credential for `issued_for`
    pub fn new(issued_for: &[&str]) -> Self {
        Self::build(true, issued_for, |issuer| issuer)
    }

    pub fn build(
        ready: bool,
        issued_for: &[&str],
        customize: impl FnOnce(FakeIssuer) -> FakeIssuer,
    ) -> Self {
        let log = CallLog::default();
        let registry = Arc::new(IssuerRegistry::from_descriptors([issuer_descriptor(ready)]));
        let store = Arc::new(RecordingStore::new(log.clone()));
        let issuer = Arc::new(customize(FakeIssuer::new(
            log.clone(),
            IssuedCredential {
                certificate: certificate_pem(issued_for).into_bytes(),
                private_key: key_pem().into_bytes(),
            },
        )));
        let diagnostics = Arc::new(RecordingDiagnostics::default());

        let mut factory = IssuerFactory::new();
        let backend = Arc::clone(&issuer);
        factory.register(FAKE_KIND, move |_| Ok(backend.clone() as Arc<dyn Issuer>));

        let ctx = ReconcileContext::new(registry.clone(), Arc::new(factory), store.clone())
            .with_diagnostics(diagnostics.clone());

        Self {
            log,
            registry,
            store,
            issuer,
            diagnostics,
            reconciler: Reconciler::new(ctx),
        }
    }

    /// Seed the store without going through the recorded create path
    pub fn seed(&self, credential: StoredCredential) {
        self.store
            .inner
            .put(&Namespace::new("prod"), "site-tls", credential);
    }
}
