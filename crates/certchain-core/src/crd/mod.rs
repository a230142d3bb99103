//! Typed cert-manager resources
//!
//! Only the subset of the cert-manager API this crate writes is modeled.

mod cluster_issuer;

pub use cluster_issuer::{
    AcmeIssuer, AcmeIssuerStatus, AcmeSolver, CertificateSelector, CloudDnsProvider, ClusterIssuer,
    ClusterIssuerSpec, ClusterIssuerStatus, Dns01Solver, IssuerRef, SecretKeySelector,
    CERT_MANAGER_GROUP,
};
