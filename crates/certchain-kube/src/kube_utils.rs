//! Kubernetes client helpers
//!
//! Every write is a server-side apply under one field manager, so repeating
//! any of these calls converges instead of failing on existing objects.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::{Discovery, Scope};
use kube::{Client, Config};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use certchain_core::BackendError;

use crate::manifest::{apply_phases, object_kind, object_name};
use crate::retry::{retry_with_backoff, RetryConfig};

/// Deployment condition meaning the rollout has minimum availability
pub const CONDITION_AVAILABLE: &str = "Available";
/// CRD condition meaning the API server serves the new type
pub const CONDITION_ESTABLISHED: &str = "Established";

const STATUS_TRUE: &str = "True";

/// Interval between readiness checks
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, BackendError> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from optional kubeconfig path with custom timeouts
///
/// Without a path the config is inferred (in-cluster, then `KUBECONFIG`).
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, BackendError> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                BackendError::rejected(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| BackendError::rejected(format!("failed to load kubeconfig: {}", e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| BackendError::rejected(format!("failed to infer config: {}", e)))?,
    };
    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Ok(Client::try_from(config)?)
}

/// Poll until a condition is met or timeout is reached
///
/// `check_fn` returns `Ok(true)` when done and `Ok(false)` to keep waiting.
/// Transient check errors count as not-yet-ready; a non-retryable error
/// (forbidden, invalid) ends the wait immediately.
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    timeout_msg: impl Into<String>,
    mut check_fn: F,
) -> Result<(), BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, BackendError>>,
{
    let start = std::time::Instant::now();
    let timeout_msg = timeout_msg.into();

    loop {
        if start.elapsed() > timeout {
            return Err(BackendError::timeout(timeout_msg));
        }

        match check_fn().await {
            Ok(true) => return Ok(()),
            Ok(false) => trace!("polling condition not yet met"),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => trace!(error = %e, "polling check failed, retrying"),
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Ensure a namespace exists (idempotent)
pub async fn ensure_namespace(
    client: &Client,
    name: &str,
    field_manager: &str,
) -> Result<(), BackendError> {
    let api: Api<Namespace> = Api::all(client.clone());
    let ns = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": name }
    });
    api.patch(name, &PatchParams::apply(field_manager).force(), &Patch::Apply(&ns))
        .await?;
    debug!(namespace = %name, "namespace applied");
    Ok(())
}

/// Run API discovery with retry.
///
/// Discovery fails transiently while freshly installed webhooks and
/// aggregated APIs register, so it gets a slower backoff than plain calls.
pub async fn run_discovery(client: &Client) -> Result<Discovery, BackendError> {
    let config = RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_secs(1),
        ..RetryConfig::default()
    };
    retry_with_backoff(&config, "api-discovery", BackendError::is_retryable, || {
        let client = client.clone();
        async move { Ok(Discovery::new(client).run().await?) }
    })
    .await
}

/// Split `group/version` into its parts; core resources have an empty group
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Server-side apply one parsed object, resolving its type through discovery.
///
/// Namespaced objects without `metadata.namespace` land in
/// `default_namespace`, matching what `kubectl apply -n` does with rendered
/// chart output.
pub async fn apply_object_with_discovery(
    client: &Client,
    discovery: &Discovery,
    obj: &Value,
    default_namespace: Option<&str>,
    field_manager: &str,
) -> Result<(), BackendError> {
    let kind = object_kind(obj);
    let name = object_name(obj)
        .ok_or_else(|| BackendError::apply(kind, "<unnamed>", "missing metadata.name"))?;
    let api_version = obj
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::apply(kind, name, "missing apiVersion"))?;

    let (group, version) = parse_api_version(api_version);
    let gvk = GroupVersionKind {
        group,
        version,
        kind: kind.to_string(),
    };
    let Some((api_resource, caps)) = discovery.resolve_gvk(&gvk) else {
        return Err(BackendError::apply(
            kind,
            name,
            format!("unknown resource type {}", api_version),
        ));
    };

    let namespace = obj
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .or(default_namespace);
    let api: Api<DynamicObject> = match (caps.scope, namespace) {
        (Scope::Namespaced, Some(ns)) => Api::namespaced_with(client.clone(), ns, &api_resource),
        (Scope::Namespaced, None) => Api::default_namespaced_with(client.clone(), &api_resource),
        (Scope::Cluster, _) => Api::all_with(client.clone(), &api_resource),
    };

    api.patch(name, &PatchParams::apply(field_manager).force(), &Patch::Apply(obj))
        .await
        .map_err(|e| BackendError::apply(kind, name, e.to_string()))?;

    trace!(kind = %kind, name = %name, namespace = ?namespace, "applied object");
    Ok(())
}

/// Apply a set of objects in dependency order.
///
/// Namespaces and CRDs go first; discovery is re-run after CRDs so the
/// types they register resolve for the remaining objects. The rest is applied
/// best-effort and the first failure is returned after every object was tried.
pub async fn apply_objects_with_discovery(
    client: &Client,
    objects: &[Value],
    default_namespace: Option<&str>,
    field_manager: &str,
) -> Result<(), BackendError> {
    if objects.is_empty() {
        return Ok(());
    }

    let (foundational, rest) = apply_phases(objects);

    let mut discovery = run_discovery(client).await?;
    for obj in &foundational {
        apply_object_with_discovery(client, &discovery, obj, default_namespace, field_manager)
            .await?;
    }
    if foundational
        .iter()
        .any(|o| object_kind(o) == "CustomResourceDefinition")
        && !rest.is_empty()
    {
        discovery = run_discovery(client).await?;
    }

    let mut first_error = None;
    let mut failed = 0usize;
    for obj in &rest {
        if let Err(e) =
            apply_object_with_discovery(client, &discovery, obj, default_namespace, field_manager)
                .await
        {
            failed += 1;
            warn!(error = %e, kind = %object_kind(obj), "apply failed, continuing");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => {
            warn!(failed, total = objects.len(), "some objects failed to apply");
            Err(e)
        }
        None => Ok(()),
    }
}

/// Whether a CRD reports the Established condition as True
pub fn crd_established(crd: &CustomResourceDefinition) -> bool {
    crd.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == CONDITION_ESTABLISHED && c.status == STATUS_TRUE)
        })
}

/// Check if a CRD exists and is established; a missing CRD is not an error
pub async fn crd_ready(client: &Client, crd_name: &str) -> Result<bool, BackendError> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    match crds.get(crd_name).await {
        Ok(crd) => Ok(crd_established(&crd)),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Wait for a CRD to be established
pub async fn wait_for_crd(
    client: &Client,
    crd_name: &str,
    timeout: Duration,
) -> Result<(), BackendError> {
    poll_until(
        timeout,
        DEFAULT_POLL_INTERVAL,
        format!("timeout waiting for CRD {}", crd_name),
        || async move {
            let ready = crd_ready(client, crd_name).await?;
            if ready {
                info!(crd = %crd_name, "CRD established");
            }
            Ok(ready)
        },
    )
    .await
}

/// Whether a Deployment reports the Available condition as True
pub fn deployment_available(deployment: &Deployment) -> bool {
    deployment
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == CONDITION_AVAILABLE && c.status == STATUS_TRUE)
        })
}

/// Wait for all deployments in a namespace to be available
///
/// An empty namespace counts as not ready: the chart always ships at least
/// one Deployment.
pub async fn wait_for_all_deployments(
    client: &Client,
    namespace: &str,
    timeout: Duration,
) -> Result<(), BackendError> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);

    poll_until(
        timeout,
        DEFAULT_POLL_INTERVAL,
        format!("timeout waiting for deployments in {} to be available", namespace),
        || {
            let deployments = deployments.clone();
            async move {
                let list = deployments.list(&ListParams::default()).await?;
                Ok(!list.items.is_empty() && list.items.iter().all(deployment_available))
            }
        },
    )
    .await
}
