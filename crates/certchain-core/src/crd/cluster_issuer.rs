//! cert-manager ClusterIssuer
//!
//! A cluster-scoped issuer backed by an ACME directory, solving DNS-01
//! challenges through Google Cloud DNS.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of cert-manager resources
pub const CERT_MANAGER_GROUP: &str = "cert-manager.io";

/// ClusterIssuer issues certificates for any namespace.
///
/// Example:
/// ```yaml
/// apiVersion: cert-manager.io/v1
/// kind: ClusterIssuer
/// metadata:
///   name: materya-issuer
/// spec:
///   acme:
///     server: https://acme-v02.api.letsencrypt.org/directory
///     email: ops@example.com
///     privateKeySecretRef:
///       name: materya-issuer-secret
///     solvers:
///       - selector: {}
///         dns01:
///           clouddns:
///             project: my-gcp-project
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cert-manager.io",
    version = "v1",
    kind = "ClusterIssuer",
    status = "ClusterIssuerStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIssuerSpec {
    /// ACME issuer configuration
    pub acme: AcmeIssuer,
}

/// ACME account and challenge configuration
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcmeIssuer {
    /// ACME directory URL
    pub server: String,
    /// Contact email registered with the ACME account
    pub email: String,
    /// Secret the controller stores the account private key in
    pub private_key_secret_ref: SecretKeySelector,
    /// Challenge solvers, tried in order of selector specificity
    pub solvers: Vec<AcmeSolver>,
}

/// Reference to a secret by name
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretKeySelector {
    /// Secret name
    pub name: String,
}

/// One challenge solver and the certificates it applies to
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct AcmeSolver {
    /// Which certificate requests this solver handles; empty matches all
    pub selector: CertificateSelector,
    /// DNS-01 challenge configuration
    pub dns01: Dns01Solver,
}

/// Certificate selector; every field empty means unrestricted
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSelector {
    /// Restrict to these DNS names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    /// Restrict to these DNS zones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_zones: Vec<String>,
}

/// DNS-01 provider configuration
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Dns01Solver {
    /// Google Cloud DNS
    pub clouddns: CloudDnsProvider,
}

/// Google Cloud DNS provider scoped to a project
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CloudDnsProvider {
    /// Cloud project that owns the DNS zones
    pub project: String,
}

/// Status written by the controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIssuerStatus {
    /// ACME account status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acme: Option<AcmeIssuerStatus>,
}

/// ACME account registration status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcmeIssuerStatus {
    /// Account URI once registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Reference to a cert-manager issuer, as used by Certificate resources
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRef {
    /// Issuer name
    pub name: String,
    /// Issuer kind (Issuer or ClusterIssuer)
    pub kind: String,
    /// Issuer group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl IssuerRef {
    /// Reference a ClusterIssuer by name
    pub fn cluster_issuer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "ClusterIssuer".to_string(),
            group: Some(CERT_MANAGER_GROUP.to_string()),
        }
    }
}
