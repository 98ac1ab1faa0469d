//! Stored credential model and validation
//!
//! A stored credential is a small map of well-known keys to bytes, laid out
//! the same way as a Kubernetes `kubernetes.io/tls` secret so ingress and
//! load-balancer integrations can consume it directly.
//!
//! [`validate`] runs the checks that decide whether a stored credential can be
//! trusted for a request, in a fixed order:
//!
//! 1. both well-known fields are present
//! 2. the certificate decodes as PEM and parses as X.509
//! 3. the private key decodes as PEM and parses as a PKCS#1 RSA key
//! 4. the key's components are mutually consistent
//! 5. the certificate's DNS names equal the requested domains
//!
//! The first failing check is reported as a [`SelfHealReason`]. None of them
//! is an error: each one means "issue a new credential".

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rsa::pkcs1::der::asn1::UintRef;
use rsa::pkcs1::{self, Version};
use rsa::pkcs8::PrivateKeyInfo;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;

use crate::domains::equal_sets;

/// Key holding the PEM encoded certificate
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Key holding the PEM encoded private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// PEM label of a PKCS#8 private key
const PKCS8_PEM_TAG: &str = "PRIVATE KEY";

/// Raw persisted credential: well-known key to bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredential {
    data: BTreeMap<String, Vec<u8>>,
}

impl StoredCredential {
    /// Create an empty credential
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a credential with both well-known fields populated
    pub fn from_parts(certificate: impl Into<Vec<u8>>, private_key: impl Into<Vec<u8>>) -> Self {
        let mut credential = Self::new();
        credential.insert(TLS_CERT_KEY, certificate);
        credential.insert(TLS_PRIVATE_KEY_KEY, private_key);
        credential
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// PEM encoded certificate bytes, if present
    pub fn certificate(&self) -> Option<&[u8]> {
        self.get(TLS_CERT_KEY)
    }

    /// PEM encoded private key bytes, if present
    pub fn private_key(&self) -> Option<&[u8]> {
        self.get(TLS_PRIVATE_KEY_KEY)
    }

    /// Iterate over all fields
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<BTreeMap<String, Vec<u8>>> for StoredCredential {
    fn from(data: BTreeMap<String, Vec<u8>>) -> Self {
        Self { data }
    }
}

/// Decoded view of a stored credential that passed every check.
///
/// Lives only for the duration of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCredential {
    /// DNS subject alternative names on the certificate
    pub dns_names: Vec<String>,
    /// Certificate serial number, colon separated hex
    pub serial: String,
    pub not_before: DateTime<Utc>,
    /// Expiry. Exposed for renewal checks; reconciliation never reads it.
    pub not_after: DateTime<Utc>,
    /// Private key modulus size in bits
    pub key_bits: usize,
}

/// Why a stored credential has to be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfHealReason {
    /// No credential is stored under the requested name
    Missing,
    /// One or both well-known fields are absent
    Incomplete { missing: Vec<&'static str> },
    /// The certificate field is not a PEM wrapped X.509 certificate
    CorruptCertificate(String),
    /// The key field is not a PEM wrapped RSA private key
    CorruptKey(String),
    /// The key parsed but its components are inconsistent
    InvalidKey(String),
    /// The certificate covers a different set of names than requested
    DomainMismatch {
        requested: Vec<String>,
        actual: Vec<String>,
    },
}

impl SelfHealReason {
    /// Short stable label, used as a log field
    pub fn as_str(&self) -> &'static str {
        match self {
            SelfHealReason::Missing => "missing",
            SelfHealReason::Incomplete { .. } => "incomplete",
            SelfHealReason::CorruptCertificate(_) => "corrupt_certificate",
            SelfHealReason::CorruptKey(_) => "corrupt_key",
            SelfHealReason::InvalidKey(_) => "invalid_key",
            SelfHealReason::DomainMismatch { .. } => "domain_mismatch",
        }
    }
}

impl fmt::Display for SelfHealReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelfHealReason::Missing => write!(f, "credential does not exist"),
            SelfHealReason::Incomplete { missing } => {
                write!(f, "credential is missing field(s): {}", missing.join(", "))
            }
            SelfHealReason::CorruptCertificate(e) => write!(f, "certificate is corrupt: {}", e),
            SelfHealReason::CorruptKey(e) => write!(f, "private key is corrupt: {}", e),
            SelfHealReason::InvalidKey(e) => write!(f, "private key failed validation: {}", e),
            SelfHealReason::DomainMismatch { requested, actual } => write!(
                f,
                "certificate domains [{}] do not match requested domains [{}]",
                actual.join(", "),
                requested.join(", ")
            ),
        }
    }
}

/// Knobs for credential validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Accept PKCS#8 `PRIVATE KEY` blocks holding an RSA key in addition to
    /// PKCS#1 `RSA PRIVATE KEY` blocks
    pub accept_pkcs8: bool,
}

/// Check a stored credential against the requested domains.
pub fn validate(
    credential: &StoredCredential,
    domains: &[String],
    policy: &ValidationPolicy,
) -> Result<ParsedCredential, SelfHealReason> {
    let (cert_bytes, key_bytes) = match (credential.certificate(), credential.private_key()) {
        (Some(cert), Some(key)) => (cert, key),
        (cert, key) => {
            let mut missing = Vec::new();
            if cert.is_none() {
                missing.push(TLS_CERT_KEY);
            }
            if key.is_none() {
                missing.push(TLS_PRIVATE_KEY_KEY);
            }
            return Err(SelfHealReason::Incomplete { missing });
        }
    };

    let certificate = parse_certificate(cert_bytes)?;
    let key = parse_private_key(key_bytes, policy)?;

    if !equal_sets(domains, &certificate.dns_names) {
        return Err(SelfHealReason::DomainMismatch {
            requested: domains.to_vec(),
            actual: certificate.dns_names,
        });
    }

    Ok(ParsedCredential {
        dns_names: certificate.dns_names,
        serial: certificate.serial,
        not_before: certificate.not_before,
        not_after: certificate.not_after,
        key_bits: key.size() * 8,
    })
}

/// Fields extracted from the certificate before the key is looked at
struct CertificateFields {
    dns_names: Vec<String>,
    serial: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

fn parse_certificate(bytes: &[u8]) -> Result<CertificateFields, SelfHealReason> {
    let block = pem::parse(bytes)
        .map_err(|e| SelfHealReason::CorruptCertificate(format!("PEM decode failed: {}", e)))?;

    let (_, cert) = parse_x509_certificate(block.contents())
        .map_err(|e| SelfHealReason::CorruptCertificate(format!("X.509 parse failed: {}", e)))?;

    let dns_names = match cert.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        Ok(None) => Vec::new(),
        Err(e) => {
            return Err(SelfHealReason::CorruptCertificate(format!(
                "invalid subject alternative name extension: {}",
                e
            )))
        }
    };

    let validity = cert.validity();
    let not_before = to_datetime(validity.not_before.timestamp())?;
    let not_after = to_datetime(validity.not_after.timestamp())?;

    Ok(CertificateFields {
        dns_names,
        serial: cert.raw_serial_as_string(),
        not_before,
        not_after,
    })
}

fn to_datetime(timestamp: i64) -> Result<DateTime<Utc>, SelfHealReason> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| {
        SelfHealReason::CorruptCertificate(format!("validity timestamp {} out of range", timestamp))
    })
}

/// Decode the key structure, then rebuild the key from its components.
///
/// Structural failures are [`SelfHealReason::CorruptKey`]. A key that decodes
/// but whose components don't fit together is [`SelfHealReason::InvalidKey`].
fn parse_private_key(
    bytes: &[u8],
    policy: &ValidationPolicy,
) -> Result<RsaPrivateKey, SelfHealReason> {
    let block = pem::parse(bytes)
        .map_err(|e| SelfHealReason::CorruptKey(format!("PEM decode failed: {}", e)))?;

    let pkcs1_der = if policy.accept_pkcs8 && block.tag() == PKCS8_PEM_TAG {
        let info = PrivateKeyInfo::try_from(block.contents())
            .map_err(|e| SelfHealReason::CorruptKey(format!("PKCS#8 parse failed: {}", e)))?;
        info.algorithm
            .assert_algorithm_oid(pkcs1::ALGORITHM_OID)
            .map_err(|e| SelfHealReason::CorruptKey(format!("PKCS#8 key is not RSA: {}", e)))?;
        info.private_key
    } else {
        block.contents()
    };

    let fields = pkcs1::RsaPrivateKey::try_from(pkcs1_der)
        .map_err(|e| SelfHealReason::CorruptKey(format!("PKCS#1 parse failed: {}", e)))?;
    if fields.version() != Version::TwoPrime {
        return Err(SelfHealReason::CorruptKey(
            "multi-prime RSA keys are not supported".to_string(),
        ));
    }

    // Checks the components against each other
    RsaPrivateKey::from_components(
        to_biguint(fields.modulus),
        to_biguint(fields.public_exponent),
        to_biguint(fields.private_exponent),
        vec![to_biguint(fields.prime1), to_biguint(fields.prime2)],
    )
    .map_err(|e| SelfHealReason::InvalidKey(e.to_string()))
}

fn to_biguint(uint: UintRef<'_>) -> BigUint {
    BigUint::from_bytes_be(uint.as_bytes())
}
