//! Orchestrator wiring the provisioning chain
//!
//! Steps run strictly in order, each handle threaded into the next step as
//! its prerequisite:
//!
//! ```text
//! namespace -> crds -> controller -> issuer
//! ```
//!
//! The first failure ends the run. Nothing already submitted is rolled back;
//! cleanup belongs to the backend.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::backend::ResourceBackend;
use crate::config::{normalize_version, ProvisioningDefaults, ProvisioningRequest};
use crate::crd::IssuerRef;
use crate::provision::{ControllerInstaller, CrdInstaller, IssuerProvisioner, NamespaceProvisioner};
use crate::resource::{ResourceHandle, ResourceKind};
use crate::{issuer_name, Error, Result, CERT_MANAGER_NAMESPACE};

/// Output of a successful run
#[derive(Debug, Clone)]
pub struct OrchestrationResult {
    /// Handle of the provisioned ClusterIssuer
    pub issuer: ResourceHandle,
}

impl OrchestrationResult {
    /// Reference other flows use to request certificates from this issuer
    pub fn issuer_ref(&self) -> IssuerRef {
        IssuerRef::cluster_issuer(self.issuer.name())
    }
}

/// Provisions cert-manager and its ClusterIssuer for one instance name
pub struct Orchestrator {
    name: String,
    defaults: ProvisioningDefaults,
    backend: Arc<dyn ResourceBackend>,
}

impl Orchestrator {
    /// Create an orchestrator for instance `name`
    pub fn new(
        name: impl Into<String>,
        defaults: ProvisioningDefaults,
        backend: Arc<dyn ResourceBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            defaults,
            backend,
        }
    }

    /// Instance name; the issuer is named `<name>-issuer`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Defaults this orchestrator was built with
    pub fn defaults(&self) -> &ProvisioningDefaults {
        &self.defaults
    }

    /// Run the chain to completion
    pub async fn run(&self, request: &ProvisioningRequest) -> Result<OrchestrationResult> {
        self.run_until_cancelled(request, CancellationToken::new())
            .await
    }

    /// Run the chain, stopping when `cancel` fires.
    ///
    /// A step in flight when cancellation arrives is abandoned and no later
    /// step is submitted.
    #[instrument(skip(self, request, cancel), fields(name = %self.name))]
    pub async fn run_until_cancelled(
        &self,
        request: &ProvisioningRequest,
        cancel: CancellationToken,
    ) -> Result<OrchestrationResult> {
        if self.name.trim().is_empty() {
            return Err(Error::precondition("name", "instance name must not be empty"));
        }
        request.validate()?;
        let version = normalize_version(request.effective_version(&self.defaults))?;
        let repository = request.effective_repository(&self.defaults);
        let backend = self.backend.as_ref();

        info!(
            version = %version,
            staging = request.effective_staging(&self.defaults),
            repository = %repository,
            "provisioning cert-manager"
        );

        let namespace = guarded(
            &cancel,
            ResourceKind::Namespace,
            NamespaceProvisioner::new(backend).declare(CERT_MANAGER_NAMESPACE),
        )
        .await?;

        let crds = guarded(
            &cancel,
            ResourceKind::CrdBundle,
            CrdInstaller::new(backend).install(&version, &namespace),
        )
        .await?;

        let default_issuer = issuer_name(&self.name);
        let controller = guarded(
            &cancel,
            ResourceKind::ControllerApp,
            ControllerInstaller::new(backend, repository).install(
                &self.name,
                &version,
                &namespace,
                &crds,
                &default_issuer,
            ),
        )
        .await?;

        let issuer = guarded(
            &cancel,
            ResourceKind::ClusterIssuer,
            IssuerProvisioner::new(backend, &self.defaults).provision(
                &self.name,
                request,
                &controller,
            ),
        )
        .await?;

        info!(issuer = %issuer.name(), id = %issuer, "cert-manager provisioned");
        Ok(OrchestrationResult { issuer })
    }
}

/// Run one step unless the run is cancelled first
async fn guarded<F>(cancel: &CancellationToken, step: ResourceKind, fut: F) -> Result<ResourceHandle>
where
    F: Future<Output = Result<ResourceHandle>>,
{
    if cancel.is_cancelled() {
        warn!(step = %step, "run cancelled before step");
        return Err(Error::Cancelled { step });
    }

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!(step = %step, "run cancelled during step");
            return Err(Error::Cancelled { step });
        }
        result = fut => result,
    };

    if let Err(e) = &result {
        warn!(step = %step, error = %e, "provisioning step failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use mockall::Sequence;

    use super::*;
    use crate::backend::MockResourceBackend;
    use crate::error::BackendError;
    use crate::resource::ResourceSpec;
    use crate::ACME_STAGING_URL;

    fn resolve(d: crate::ResourceDeclaration) -> std::result::Result<ResourceHandle, BackendError> {
        let id = format!("{}-id", d.kind);
        Ok(ResourceHandle::resolved(id, d.kind, d.name))
    }

    #[tokio::test]
    async fn submits_chain_in_order() {
        let mut backend = MockResourceBackend::new();
        let mut seq = Sequence::new();
        let expected = [
            (ResourceKind::Namespace, vec![]),
            (ResourceKind::CrdBundle, vec!["Namespace-id"]),
            (ResourceKind::ControllerApp, vec!["Namespace-id", "CRDBundle-id"]),
            (ResourceKind::ClusterIssuer, vec!["ControllerApp-id"]),
        ];
        for (kind, prereqs) in expected {
            backend
                .expect_submit()
                .withf(move |d| d.kind == kind && d.prerequisite_ids() == prereqs)
                .times(1)
                .in_sequence(&mut seq)
                .returning(resolve);
        }

        let orchestrator = Orchestrator::new("materya", ProvisioningDefaults::default(), Arc::new(backend));
        let result = orchestrator
            .run(&ProvisioningRequest::new("proj", "ops@example.com"))
            .await
            .unwrap();

        assert_eq!(result.issuer.name(), "materya-issuer");
        assert_eq!(result.issuer_ref().name, "materya-issuer");
        assert_eq!(result.issuer_ref().kind, "ClusterIssuer");
    }

    #[tokio::test]
    async fn invalid_request_makes_no_backend_calls() {
        let mut backend = MockResourceBackend::new();
        backend.expect_submit().never();
        let orchestrator = Orchestrator::new("materya", ProvisioningDefaults::default(), Arc::new(backend));

        let err = orchestrator
            .run(&ProvisioningRequest::new("proj", "ops@example.com").with_version("not-a-version"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Precondition { ref field, .. } if field == "controller_version"));
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let mut backend = MockResourceBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_submit()
            .withf(|d| d.kind == ResourceKind::Namespace)
            .times(1)
            .in_sequence(&mut seq)
            .returning(resolve);
        backend
            .expect_submit()
            .withf(|d| d.kind == ResourceKind::CrdBundle)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|d| match d.spec {
                ResourceSpec::RemoteManifest { url } => Err(BackendError::fetch(url, "404 Not Found")),
                _ => Err(BackendError::rejected("unexpected spec")),
            });

        let orchestrator = Orchestrator::new("materya", ProvisioningDefaults::default(), Arc::new(backend));
        let err = orchestrator
            .run(&ProvisioningRequest::new("proj", "ops@example.com"))
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(ResourceKind::CrdBundle));
        assert!(err.to_string().contains("404 Not Found"));
    }

    #[tokio::test]
    async fn cancelled_token_submits_nothing() {
        let mut backend = MockResourceBackend::new();
        backend.expect_submit().never();
        let orchestrator = Orchestrator::new("materya", ProvisioningDefaults::default(), Arc::new(backend));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orchestrator
            .run_until_cancelled(&ProvisioningRequest::new("proj", "ops@example.com"), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { step: ResourceKind::Namespace }));
    }

    #[tokio::test]
    async fn cancellation_mid_run_skips_remaining_steps() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();

        let mut backend = MockResourceBackend::new();
        backend.expect_submit().returning(move |d| {
            record.lock().unwrap().push(d.kind);
            if d.kind == ResourceKind::CrdBundle {
                trigger.cancel();
            }
            resolve(d)
        });

        let orchestrator = Orchestrator::new("materya", ProvisioningDefaults::default(), Arc::new(backend));
        let err = orchestrator
            .run_until_cancelled(&ProvisioningRequest::new("proj", "ops@example.com"), cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { step: ResourceKind::ControllerApp }));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ResourceKind::Namespace, ResourceKind::CrdBundle]
        );
    }

    #[tokio::test]
    async fn defaults_flow_into_declarations() {
        let defaults = ProvisioningDefaults {
            controller_version: "0.15.1".to_string(),
            staging: true,
            chart_repository: "https://mirror.example".to_string(),
        };
        let mut backend = MockResourceBackend::new();
        backend
            .expect_submit()
            .withf(|d| match &d.spec {
                ResourceSpec::HelmChart(chart) => {
                    chart.version == "0.15.1" && chart.repository == "https://mirror.example"
                }
                ResourceSpec::ClusterIssuer(issuer) => issuer.spec.acme.server == ACME_STAGING_URL,
                ResourceSpec::RemoteManifest { url } => url.contains("/v0.15.1/"),
                ResourceSpec::Namespace => true,
            })
            .times(4)
            .returning(resolve);

        let orchestrator = Orchestrator::new("materya", defaults, Arc::new(backend));
        orchestrator
            .run(&ProvisioningRequest::new("proj", "ops@example.com"))
            .await
            .unwrap();
    }
}
