//! Resource declarations and handles
//!
//! A [`ResourceDeclaration`] is what a provisioner hands to the backend; a
//! [`ResourceHandle`] is what it gets back. Handles are the unit every
//! dependency edge points at.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crd::ClusterIssuer;

/// Kind of object in the provisioning chain
///
/// Also identifies the step a run failed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// The controller's install namespace
    Namespace,
    /// The custom resource definition bundle
    #[serde(rename = "CRDBundle")]
    CrdBundle,
    /// The chart-packaged controller
    ControllerApp,
    /// The cluster-wide ACME issuer
    ClusterIssuer,
}

impl ResourceKind {
    /// All kinds in provisioning order
    pub const CHAIN: [ResourceKind; 4] = [
        ResourceKind::Namespace,
        ResourceKind::CrdBundle,
        ResourceKind::ControllerApp,
        ResourceKind::ClusterIssuer,
    ];

    /// Canonical display name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "Namespace",
            ResourceKind::CrdBundle => "CRDBundle",
            ResourceKind::ControllerApp => "ControllerApp",
            ResourceKind::ClusterIssuer => "ClusterIssuer",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A packaged application rendered from a Helm chart
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    /// Chart name within the repository
    pub chart: String,
    /// Chart version (without a leading `v`)
    pub version: String,
    /// Chart repository URL
    pub repository: String,
    /// Namespace the release is installed into
    pub namespace: String,
    /// Values passed to the chart
    pub values: serde_json::Value,
}

/// Kind-specific payload of a declaration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResourceSpec {
    /// A plain namespace; the declaration name is the namespace name
    Namespace,
    /// A multi-document manifest the backend fetches and applies
    RemoteManifest {
        /// Location of the manifest bundle
        url: String,
    },
    /// A chart release
    HelmChart(ChartSpec),
    /// A typed ClusterIssuer object
    ClusterIssuer(Box<ClusterIssuer>),
}

/// A resource submitted to the backend together with what it waits on
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDeclaration {
    /// Kind of the resource
    pub kind: ResourceKind,
    /// Name of the resource (namespace name, release name, object name)
    pub name: String,
    /// Kind-specific payload
    pub spec: ResourceSpec,
    /// Handles that must be satisfied before this resource is materialized
    #[serde(serialize_with = "serialize_prerequisites")]
    pub prerequisites: Vec<ResourceHandle>,
}

impl ResourceDeclaration {
    /// Create a declaration with no prerequisites
    pub fn new(kind: ResourceKind, name: impl Into<String>, spec: ResourceSpec) -> Self {
        Self {
            kind,
            name: name.into(),
            spec,
            prerequisites: Vec::new(),
        }
    }

    /// Add a prerequisite handle
    pub fn depends_on(mut self, handle: &ResourceHandle) -> Self {
        self.prerequisites.push(handle.clone());
        self
    }

    /// Ids of the prerequisite handles, in declaration order
    pub fn prerequisite_ids(&self) -> Vec<&str> {
        self.prerequisites.iter().map(|h| h.id()).collect()
    }

    /// First prerequisite that is not resolved, if any
    pub fn unresolved_prerequisite(&self) -> Option<&ResourceHandle> {
        self.prerequisites.iter().find(|h| !h.is_resolved())
    }
}

fn serialize_prerequisites<S>(handles: &[ResourceHandle], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(handles.iter().map(|h| h.id()))
}

/// Opaque reference to a declared resource plus its resolution state
///
/// Issued by a backend. Clones share resolution state, so a backend that
/// materializes asynchronously can mark the handle resolved after returning it.
#[derive(Clone)]
pub struct ResourceHandle {
    id: String,
    kind: ResourceKind,
    name: String,
    resolved: Arc<AtomicBool>,
}

impl ResourceHandle {
    /// Create a handle for a resource the backend has materialized
    pub fn resolved(id: impl Into<String>, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::with_state(id, kind, name, true)
    }

    /// Create a handle for a resource that is accepted but not yet materialized
    pub fn pending(id: impl Into<String>, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::with_state(id, kind, name, false)
    }

    fn with_state(
        id: impl Into<String>,
        kind: ResourceKind,
        name: impl Into<String>,
        resolved: bool,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            resolved: Arc::new(AtomicBool::new(resolved)),
        }
    }

    /// Unique id within a run
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Kind of the referenced resource
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Name of the referenced resource
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the backend reported successful materialization
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Record successful materialization; visible through every clone
    pub fn mark_resolved(&self) {
        self.resolved.store(true, Ordering::Release);
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResourceHandle {}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
