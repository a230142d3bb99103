//! ClusterIssuer provisioning
//!
//! Everything here is derived from the request; the only branch is the ACME
//! endpoint choice.

use tracing::info;

use super::{require_resolved, submit};
use crate::backend::ResourceBackend;
use crate::config::{ProvisioningDefaults, ProvisioningRequest};
use crate::crd::{
    AcmeIssuer, AcmeSolver, CertificateSelector, CloudDnsProvider, ClusterIssuer,
    ClusterIssuerSpec, Dns01Solver, SecretKeySelector,
};
use crate::resource::{ResourceDeclaration, ResourceHandle, ResourceKind, ResourceSpec};
use crate::{
    issuer_name, issuer_secret_name, Error, Result, ACME_PRODUCTION_URL, ACME_STAGING_URL,
};

/// DNS-01 provider the solver is configured for
pub const DNS_PROVIDER: &str = "clouddns";

/// ACME settings of a ClusterIssuer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerConfiguration {
    /// ACME directory URL
    pub acme_server_url: String,
    /// Contact email for the ACME account
    pub contact_email: String,
    /// Secret holding the ACME account key
    pub private_key_secret_name: String,
    /// Cloud project scoping the DNS-01 solver
    pub project: String,
}

impl IssuerConfiguration {
    /// Derive the configuration for instance `name`
    pub fn derive(
        name: &str,
        request: &ProvisioningRequest,
        defaults: &ProvisioningDefaults,
    ) -> Self {
        let acme_server_url = if request.effective_staging(defaults) {
            ACME_STAGING_URL
        } else {
            ACME_PRODUCTION_URL
        };

        Self {
            acme_server_url: acme_server_url.to_string(),
            contact_email: request.contact_email.trim().to_string(),
            private_key_secret_name: issuer_secret_name(name),
            project: request.project.trim().to_string(),
        }
    }

    /// Build the ClusterIssuer object named `issuer_name`
    pub fn to_cluster_issuer(&self, issuer_name: &str) -> ClusterIssuer {
        ClusterIssuer::new(
            issuer_name,
            ClusterIssuerSpec {
                acme: AcmeIssuer {
                    server: self.acme_server_url.clone(),
                    email: self.contact_email.clone(),
                    private_key_secret_ref: SecretKeySelector {
                        name: self.private_key_secret_name.clone(),
                    },
                    solvers: vec![AcmeSolver {
                        selector: CertificateSelector::default(),
                        dns01: Dns01Solver {
                            clouddns: CloudDnsProvider {
                                project: self.project.clone(),
                            },
                        },
                    }],
                },
            },
        )
    }
}

/// Declares the ClusterIssuer once the controller that watches it exists
pub struct IssuerProvisioner<'a> {
    backend: &'a dyn ResourceBackend,
    defaults: &'a ProvisioningDefaults,
}

impl<'a> IssuerProvisioner<'a> {
    /// Create a provisioner submitting to `backend`
    pub fn new(backend: &'a dyn ResourceBackend, defaults: &'a ProvisioningDefaults) -> Self {
        Self { backend, defaults }
    }

    /// Declare the `<name>-issuer` ClusterIssuer after `controller`.
    ///
    /// ACME account registration happens in the controller after submission
    /// and is not awaited.
    pub async fn provision(
        &self,
        name: &str,
        request: &ProvisioningRequest,
        controller: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        if name.trim().is_empty() {
            return Err(Error::precondition("name", "issuer name must not be empty"));
        }
        request.validate()?;
        require_resolved(ResourceKind::ClusterIssuer, &[controller])?;

        let config = IssuerConfiguration::derive(name, request, self.defaults);
        let object_name = issuer_name(name);
        info!(
            issuer = %object_name,
            server = %config.acme_server_url,
            project = %config.project,
            "declaring cluster issuer"
        );

        let issuer = config.to_cluster_issuer(&object_name);
        let declaration = ResourceDeclaration::new(
            ResourceKind::ClusterIssuer,
            object_name,
            ResourceSpec::ClusterIssuer(Box::new(issuer)),
        )
        .depends_on(controller);
        submit(self.backend, declaration).await
    }
}
