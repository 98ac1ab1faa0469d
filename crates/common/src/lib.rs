//! Shared types for certsync
//!
//! - [`ids`]: namespace and object key newtypes
//! - [`types`]: declarative certificate request and issuer descriptor

pub mod ids;
pub mod types;

pub use ids::{Namespace, ObjectKey, DEFAULT_NAMESPACE};
pub use types::{CertificateRequest, IssuerDescriptor};
