//! Dependency-ordered provisioning of cert-manager and an ACME ClusterIssuer
//!
//! A run declares four resources in a fixed chain, each one threading the
//! previous handle in as its prerequisite:
//!
//! ```text
//! Namespace -> CRDBundle -> ControllerApp -> ClusterIssuer
//! ```
//!
//! Materialization is delegated to a [`ResourceBackend`]. The resulting
//! ClusterIssuer handle is the only public output of a run.

#![deny(missing_docs)]

pub mod backend;
pub mod config;
pub mod crd;
pub mod error;
pub mod orchestrator;
pub mod provision;
pub mod resource;

pub use backend::{RecordingBackend, ResourceBackend};
pub use config::{ProvisioningDefaults, ProvisioningRequest};
pub use error::{BackendError, Error};
pub use orchestrator::{OrchestrationResult, Orchestrator};
pub use resource::{ChartSpec, ResourceDeclaration, ResourceHandle, ResourceKind, ResourceSpec};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the controller is installed into
pub const CERT_MANAGER_NAMESPACE: &str = "cert-manager";

/// Chart name of the controller package
pub const CERT_MANAGER_CHART: &str = "cert-manager";

/// Default chart repository for the controller package
pub const DEFAULT_CHART_REPOSITORY: &str = "https://charts.jetstack.io";

/// Controller version used when neither the request nor the environment pins one
pub const DEFAULT_CONTROLLER_VERSION: &str = "0.14.3";

/// Base of the remote CRD manifest location
pub const CRD_MANIFEST_BASE: &str = "https://raw.githubusercontent.com/jetstack/cert-manager";

/// Path of the CRD bundle inside a cert-manager release tree
pub const CRD_MANIFEST_PATH: &str = "deploy/manifests/00-crds.yaml";

/// Let's Encrypt staging ACME directory
pub const ACME_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Let's Encrypt production ACME directory
pub const ACME_PRODUCTION_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Kind the controller uses for its default issuer binding
pub const DEFAULT_ISSUER_KIND: &str = "ClusterIssuer";

/// Name of the ClusterIssuer provisioned for an orchestrator instance.
///
/// Other resources reference the issuer by this name before it exists, so the
/// `<name>-issuer` form must not change.
pub fn issuer_name(name: &str) -> String {
    format!("{}-issuer", name)
}

/// Name of the secret holding the ACME account private key
pub fn issuer_secret_name(name: &str) -> String {
    format!("{}-issuer-secret", name)
}
