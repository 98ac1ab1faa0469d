//! Configuration module for certsync
//!
//! Loads the controller settings, the credential store backend, logging
//! options, and the declarative issuers and certificate requests the
//! controller reconciles.
//!
//! # Module Organization
//!
//! - [`controller`]: Resync loop and validation policy settings
//! - [`store`]: Credential store backend selection
//! - [`observability`]: Logging configuration
//! - [`validate`]: Semantic validation and linting
//!
//! # Example
//!
//! ```toml
//! [controller]
//! resync_interval_secs = 300
//!
//! [store]
//! type = "filesystem"
//! path = "/var/lib/certsync"
//!
//! [[issuers]]
//! name = "prod-ca"
//! kind = "self-signed"
//! ready = true
//!
//! [[certificates]]
//! name = "site"
//! issuer_ref = "prod-ca"
//! secret_name = "site-tls"
//! domains = ["example.com", "www.example.com"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use certsync_common::{CertificateRequest, IssuerDescriptor};

// ============================================================================
// Module Declarations
// ============================================================================

pub mod controller;
pub mod observability;
pub mod store;
pub mod validate;

// ============================================================================
// Re-exports
// ============================================================================

pub use controller::ControllerConfig;
pub use observability::{LogFormat, LoggingConfig};
pub use store::StoreConfig;
pub use validate::{ValidationError, ValidationResult, ValidationWarning};

// ============================================================================
// Main Configuration Structure
// ============================================================================

/// Main configuration structure for certsync
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Resync loop and validation policy
    #[serde(default)]
    #[validate(nested)]
    pub controller: ControllerConfig,

    /// Credential store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Issuers that certificate requests may reference
    #[serde(default)]
    pub issuers: Vec<IssuerDescriptor>,

    /// Certificate requests to reconcile
    #[serde(default)]
    pub certificates: Vec<CertificateRequest>,
}

impl Config {
    /// Load configuration from a file
    ///
    /// The format is chosen by extension: `.toml` (default) or `.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("toml");

        match extension {
            "toml" => Self::from_toml(&content),
            "json" => Self::from_json(&content),
            _ => Err(anyhow::anyhow!("Unsupported config format: {}", extension)),
        }
    }

    /// Parse configuration from TOML format
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Parse configuration from JSON format
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse JSON configuration")
    }

    /// Validate the configuration
    ///
    /// Returns the collected warnings when the configuration is usable, or
    /// an error listing every problem found.
    pub fn validate(&self) -> Result<ValidationResult> {
        Validate::validate(self)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

        let mut result = validate::resources::validate_resources(self);
        result.merge(validate::lint::lint_config(self));

        if !result.is_valid() {
            let messages: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
            anyhow::bail!(
                "Configuration validation failed:\n  {}",
                messages.join("\n  ")
            );
        }

        for warning in &result.warnings {
            tracing::warn!("{}", warning);
        }

        Ok(result)
    }
}
