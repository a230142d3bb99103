//! CLI commands

use clap::{Args, ValueEnum};

use certchain_core::{ProvisioningRequest, CERT_MANAGER_NAMESPACE};

pub mod install;
pub mod render;

/// Flags shared by every command that builds a provisioning request
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Instance name; the ClusterIssuer is named `<name>-issuer`
    #[arg(long, default_value = CERT_MANAGER_NAMESPACE)]
    pub name: String,

    /// Cloud project the DNS-01 solver manages records in
    #[arg(long, env = "CERTCHAIN_PROJECT")]
    pub project: String,

    /// Contact email for the ACME account
    #[arg(long, env = "CERTCHAIN_EMAIL")]
    pub email: String,

    /// Use the ACME staging endpoint (`--staging`, `--staging=false`)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub staging: Option<bool>,

    /// cert-manager version for both the CRDs and the chart
    #[arg(long)]
    pub controller_version: Option<String>,

    /// Chart repository URL
    #[arg(long)]
    pub repository: Option<String>,
}

impl RequestArgs {
    /// Build the request; unset flags defer to process defaults
    pub fn to_request(&self) -> ProvisioningRequest {
        let mut request = ProvisioningRequest::new(&self.project, &self.email);
        request.use_staging_endpoint = self.staging;
        request.controller_version = self.controller_version.clone();
        request.source_repository = self.repository.clone();
        request
    }
}

/// Serialization format for printed declarations
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}
