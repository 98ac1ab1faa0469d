//! Configuration linting
//!
//! Flags definitions that load fine but will make reconciliation fail at
//! runtime until something outside the controller changes.

use std::collections::{HashMap, HashSet};

use super::{ValidationResult, ValidationWarning};
use crate::Config;

/// Lint configuration for likely mistakes
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    let issuers: HashMap<_, _> = config
        .issuers
        .iter()
        .map(|issuer| (issuer.key(), issuer))
        .collect();

    for certificate in &config.certificates {
        match issuers.get(&certificate.issuer_key()) {
            None => {
                result.add_warning(ValidationWarning::new(format!(
                    "Certificate '{}' references undefined issuer '{}'",
                    certificate.key(),
                    certificate.issuer_ref
                )));
            }
            Some(issuer) if !issuer.ready => {
                result.add_warning(ValidationWarning::new(format!(
                    "Certificate '{}' references issuer '{}' which is not ready",
                    certificate.key(),
                    issuer.key()
                )));
            }
            Some(_) => {}
        }

        let mut seen = HashSet::new();
        for domain in &certificate.domains {
            if !seen.insert(domain.as_str()) {
                result.add_warning(ValidationWarning::new(format!(
                    "Certificate '{}' lists domain '{}' more than once",
                    certificate.key(),
                    domain
                )));
            }
        }
    }

    result
}
