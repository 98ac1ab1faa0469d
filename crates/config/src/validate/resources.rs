//! Structural checks on issuers and certificate requests.

use std::collections::HashSet;

use super::{ErrorCategory, ValidationError, ValidationResult};
use crate::Config;

/// Validate issuer and certificate definitions
///
/// Errors here make the configuration unusable: two requests writing the
/// same stored credential would reissue over each other forever, and a
/// request without domains can never be satisfied.
pub fn validate_resources(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    let mut issuers = HashSet::new();
    for issuer in &config.issuers {
        if issuer.name.trim().is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Issuer,
                format!("Issuer in namespace '{}' has an empty name", issuer.namespace),
            ));
        }
        if issuer.kind.trim().is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Issuer,
                format!("Issuer '{}' has no kind", issuer.key()),
            ));
        }
        if !issuers.insert(issuer.key()) {
            result.add_error(ValidationError::new(
                ErrorCategory::Issuer,
                format!("Issuer '{}' is defined more than once", issuer.key()),
            ));
        }
    }

    let mut requests = HashSet::new();
    let mut secrets = HashSet::new();
    for certificate in &config.certificates {
        let key = certificate.key();

        if !requests.insert(key.clone()) {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!("Certificate '{}' is defined more than once", key),
            ));
        }

        if certificate.secret_name.trim().is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!("Certificate '{}' has an empty secret_name", key),
            ));
        } else if !secrets.insert(certificate.secret_key()) {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!(
                    "Certificate '{}' targets credential '{}' which another certificate already targets",
                    key,
                    certificate.secret_key()
                ),
            ));
        }

        if certificate.domains.is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!("Certificate '{}' lists no domains", key),
            ));
        }

        if certificate.domains.iter().any(|d| d.trim().is_empty()) {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!("Certificate '{}' contains an empty domain", key),
            ));
        }
    }

    result
}
