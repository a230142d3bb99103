//! Chart-packaged controller installation

use serde_json::{json, Value};
use tracing::{debug, info};

use super::{require_resolved, submit};
use crate::backend::ResourceBackend;
use crate::config::normalize_version;
use crate::resource::{ChartSpec, ResourceDeclaration, ResourceHandle, ResourceKind, ResourceSpec};
use crate::{Error, Result, CERT_MANAGER_CHART, CERT_MANAGER_NAMESPACE, DEFAULT_ISSUER_KIND};

/// Chart values binding the controller's default issuer
///
/// The issuer is referenced by name only; it does not need to exist yet.
pub fn controller_values(default_issuer_name: &str) -> Value {
    json!({
        "ingressShim": {
            "defaultIssuerName": default_issuer_name,
            "defaultIssuerKind": DEFAULT_ISSUER_KIND,
        }
    })
}

/// Declares the controller chart release
pub struct ControllerInstaller<'a> {
    backend: &'a dyn ResourceBackend,
    repository: String,
}

impl<'a> ControllerInstaller<'a> {
    /// Create an installer pulling the chart from `repository`
    pub fn new(backend: &'a dyn ResourceBackend, repository: impl Into<String>) -> Self {
        Self {
            backend,
            repository: repository.into(),
        }
    }

    /// Declare release `name` of the controller chart at `version`.
    ///
    /// Both `namespace` and `crds` must be resolved; nothing is submitted
    /// otherwise.
    pub async fn install(
        &self,
        name: &str,
        version: &str,
        namespace: &ResourceHandle,
        crds: &ResourceHandle,
        default_issuer_name: &str,
    ) -> Result<ResourceHandle> {
        require_resolved(ResourceKind::ControllerApp, &[namespace, crds])?;
        if name.trim().is_empty() {
            return Err(Error::precondition("name", "release name must not be empty"));
        }
        let version = normalize_version(version)?;

        let chart = ChartSpec {
            chart: CERT_MANAGER_CHART.to_string(),
            version,
            repository: self.repository.clone(),
            namespace: CERT_MANAGER_NAMESPACE.to_string(),
            values: controller_values(default_issuer_name),
        };
        info!(
            release = %name,
            chart = %chart.chart,
            version = %chart.version,
            repository = %chart.repository,
            "declaring controller release"
        );
        debug!(values = %chart.values, "controller values");

        let declaration =
            ResourceDeclaration::new(ResourceKind::ControllerApp, name, ResourceSpec::HelmChart(chart))
                .depends_on(namespace)
                .depends_on(crds);
        submit(self.backend, declaration).await
    }
}
