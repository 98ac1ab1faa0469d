//! Self-signed issuer
//!
//! Generates a fresh RSA key per issuance and a certificate covering the
//! requested domains, signed by that same key. The key is returned as a
//! PKCS#1 `RSA PRIVATE KEY` block, the encoding stored credentials use.

use std::time::Instant;

use async_trait::async_trait;
use rcgen::{CertificateParams, DnType, KeyPair};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use tracing::{debug, info};

use certsync_common::CertificateRequest;

use super::{IssuedCredential, Issuer, IssuerError};

/// Issuer kind served by [`SelfSignedIssuer`]
pub const SELF_SIGNED_KIND: &str = "self-signed";

/// Default RSA modulus size
const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest RSA modulus the issuer will generate
const MIN_KEY_BITS: usize = 2048;

/// Issues self-signed certificates
#[derive(Debug, Clone)]
pub struct SelfSignedIssuer {
    key_bits: usize,
}

impl SelfSignedIssuer {
    /// Create an issuer generating keys of the given size
    ///
    /// The size is clamped to a minimum of 2048 bits.
    pub fn with_key_bits(key_bits: usize) -> Self {
        Self {
            key_bits: key_bits.max(MIN_KEY_BITS),
        }
    }

    pub fn key_bits(&self) -> usize {
        self.key_bits
    }
}

impl Default for SelfSignedIssuer {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

#[async_trait]
impl Issuer for SelfSignedIssuer {
    async fn prepare(&self, request: &CertificateRequest) -> Result<(), IssuerError> {
        if request.domains.is_empty() {
            return Err(IssuerError::Preparation(format!(
                "certificate '{}' lists no domains",
                request.key()
            )));
        }
        debug!(certificate = %request.key(), "Self-signed issuer ready");
        Ok(())
    }

    async fn issue(&self, request: &CertificateRequest) -> Result<IssuedCredential, IssuerError> {
        let start = Instant::now();
        let domains = request.domains.clone();
        let key_bits = self.key_bits;

        // RSA key generation is CPU bound
        let issued = tokio::task::spawn_blocking(move || generate(domains, key_bits))
            .await
            .map_err(|e| IssuerError::Issuance(format!("key generation task failed: {}", e)))??;

        info!(
            certificate = %request.key(),
            key_bits,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Issued self-signed certificate"
        );

        Ok(issued)
    }
}

fn generate(domains: Vec<String>, key_bits: usize) -> Result<IssuedCredential, IssuerError> {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), key_bits)
        .map_err(|e| IssuerError::Issuance(format!("RSA key generation failed: {}", e)))?;

    // rcgen loads RSA signing keys from PKCS#8
    let pkcs8 = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| IssuerError::Issuance(format!("PKCS#8 encoding failed: {}", e)))?;
    let signing_key = KeyPair::from_pem_and_sign_algo(&pkcs8, &rcgen::PKCS_RSA_SHA256)
        .map_err(|e| IssuerError::Issuance(format!("loading signing key failed: {}", e)))?;

    let mut params = CertificateParams::new(domains.clone())
        .map_err(|e| IssuerError::Issuance(format!("invalid subject alternative names: {}", e)))?;
    if let Some(primary) = domains.first() {
        params
            .distinguished_name
            .push(DnType::CommonName, primary.as_str());
    }

    let certificate = params
        .self_signed(&signing_key)
        .map_err(|e| IssuerError::Issuance(format!("certificate signing failed: {}", e)))?;

    let key_pem = key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| IssuerError::Issuance(format!("PKCS#1 encoding failed: {}", e)))?;

    Ok(IssuedCredential {
        certificate: certificate.pem().into_bytes(),
        private_key: key_pem.as_bytes().to_vec(),
    })
}
