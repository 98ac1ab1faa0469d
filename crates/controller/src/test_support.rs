//! Credential fixtures for unit tests.

use std::sync::OnceLock;

use rsa::pkcs1::der::asn1::UintRef;
use rsa::pkcs1::der::{Decode, Encode};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;

/// One RSA key shared by every test in the binary; generation is slow.
fn rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap())
}

/// Self-signed certificate PEM covering `names`
pub(crate) fn certificate_pem(names: &[&str]) -> String {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let params =
        rcgen::CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
            .unwrap();
    params.self_signed(&key_pair).unwrap().pem()
}

/// PKCS#1 `RSA PRIVATE KEY` PEM
pub(crate) fn pkcs1_key_pem() -> String {
    rsa_key().to_pkcs1_pem(LineEnding::LF).unwrap().as_str().to_owned()
}

/// PKCS#8 `PRIVATE KEY` PEM of the same key
pub(crate) fn pkcs8_key_pem() -> String {
    rsa_key().to_pkcs8_pem(LineEnding::LF).unwrap().as_str().to_owned()
}

/// PKCS#1 key that parses but whose public exponent no longer matches the
/// private exponent
pub(crate) fn tampered_key_pem() -> String {
    pem::encode(&pem::Pem::new("RSA PRIVATE KEY", tampered_key_der()))
}

/// The tampered key wrapped in a PKCS#8 `PRIVATE KEY` block
pub(crate) fn tampered_pkcs8_key_pem() -> String {
    let pkcs1_der = tampered_key_der();
    let info = rsa::pkcs8::PrivateKeyInfo::new(rsa::pkcs1::ALGORITHM_ID, &pkcs1_der);
    pem::encode(&pem::Pem::new("PRIVATE KEY", info.to_der().unwrap()))
}

fn tampered_key_der() -> Vec<u8> {
    let der = rsa_key().to_pkcs1_der().unwrap();
    let mut key = rsa::pkcs1::RsaPrivateKey::from_der(der.as_bytes()).unwrap();
    key.public_exponent = UintRef::new(&[3]).unwrap();
    key.to_der().unwrap()
}
