//! Cluster-backed resource backend
//!
//! `submit` returns only after the resource is usable: CRDs report Established,
//! controller Deployments are Available. A returned handle is therefore
//! always resolved.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use tracing::{info, instrument};

use certchain_core::backend::handle_id;
use certchain_core::crd::ClusterIssuer;
use certchain_core::{
    BackendError, ChartSpec, ResourceBackend, ResourceDeclaration, ResourceHandle, ResourceSpec,
};

use crate::fetch::{fetch_manifest, http_client};
use crate::helm::render_chart;
use crate::kube_utils::{
    apply_objects_with_discovery, create_client, ensure_namespace, wait_for_all_deployments,
    wait_for_crd,
};
use crate::manifest::{crd_names, parse_objects};
use crate::retry::RetryConfig;

/// Field manager for every server-side apply
pub const FIELD_MANAGER: &str = "certchain";

/// Default time to wait for CRDs and Deployments to become ready
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(300);

/// Settings for [`KubeBackend`]
#[derive(Clone, Debug)]
pub struct KubeBackendConfig {
    /// Kubeconfig to load; inferred when unset
    pub kubeconfig: Option<PathBuf>,
    /// Field manager name used for server-side apply
    pub field_manager: String,
    /// How long to wait for applied resources to become ready
    pub readiness_timeout: Duration,
    /// Backoff for manifest downloads
    pub retry: RetryConfig,
}

impl Default for KubeBackendConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            field_manager: FIELD_MANAGER.to_string(),
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

/// Materializes declarations on a Kubernetes cluster
pub struct KubeBackend {
    client: Client,
    http: reqwest::Client,
    config: KubeBackendConfig,
    seq: AtomicUsize,
}

impl KubeBackend {
    /// Create a backend over an existing client
    pub fn new(client: Client, config: KubeBackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client,
            http: http_client()?,
            config,
            seq: AtomicUsize::new(0),
        })
    }

    /// Connect using the kubeconfig named in `config`
    pub async fn connect(config: KubeBackendConfig) -> Result<Self, BackendError> {
        let client = create_client(config.kubeconfig.as_deref()).await?;
        Self::new(client, config)
    }

    async fn apply_namespace(&self, name: &str) -> Result<(), BackendError> {
        ensure_namespace(&self.client, name, &self.config.field_manager).await
    }

    async fn apply_remote_manifest(&self, url: &str) -> Result<(), BackendError> {
        let body = fetch_manifest(&self.http, url, &self.config.retry).await?;
        let objects = parse_objects(url, &body)?;
        if objects.is_empty() {
            return Err(BackendError::fetch(url, "manifest contains no objects"));
        }

        apply_objects_with_discovery(&self.client, &objects, None, &self.config.field_manager)
            .await?;
        for crd in crd_names(&objects) {
            wait_for_crd(&self.client, crd, self.config.readiness_timeout).await?;
        }
        info!(url = %url, objects = objects.len(), "manifest applied");
        Ok(())
    }

    async fn apply_chart(&self, release: &str, chart: &ChartSpec) -> Result<(), BackendError> {
        let rendered = render_chart(release, chart).await?;
        let objects = parse_objects(&chart.chart, &rendered)?;

        apply_objects_with_discovery(
            &self.client,
            &objects,
            Some(&chart.namespace),
            &self.config.field_manager,
        )
        .await?;
        wait_for_all_deployments(&self.client, &chart.namespace, self.config.readiness_timeout)
            .await?;
        info!(release = %release, chart = %chart.chart, version = %chart.version, "chart applied");
        Ok(())
    }

    async fn apply_cluster_issuer(&self, issuer: &ClusterIssuer) -> Result<(), BackendError> {
        let name = issuer
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| BackendError::apply("ClusterIssuer", "<unnamed>", "missing name"))?;
        let api: Api<ClusterIssuer> = Api::all(self.client.clone());
        api.patch(
            name,
            &PatchParams::apply(&self.config.field_manager).force(),
            &Patch::Apply(issuer),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceBackend for KubeBackend {
    #[instrument(skip(self, declaration), fields(kind = %declaration.kind, name = %declaration.name))]
    async fn submit(
        &self,
        declaration: ResourceDeclaration,
    ) -> Result<ResourceHandle, BackendError> {
        if let Some(unresolved) = declaration.unresolved_prerequisite() {
            return Err(BackendError::rejected(format!(
                "{} {} waits on unresolved {}",
                declaration.kind, declaration.name, unresolved
            )));
        }

        match &declaration.spec {
            ResourceSpec::Namespace => self.apply_namespace(&declaration.name).await?,
            ResourceSpec::RemoteManifest { url } => self.apply_remote_manifest(url).await?,
            ResourceSpec::HelmChart(chart) => self.apply_chart(&declaration.name, chart).await?,
            ResourceSpec::ClusterIssuer(issuer) => self.apply_cluster_issuer(issuer).await?,
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = handle_id(declaration.kind, &declaration.name, seq);
        Ok(ResourceHandle::resolved(id, declaration.kind, declaration.name))
    }
}
