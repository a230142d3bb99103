//! The four provisioning steps
//!
//! Each provisioner builds one declaration, checks the prerequisite handles it
//! is given, and submits through the backend. None of them talk to the
//! network themselves.

mod controller;
mod crds;
mod issuer;
mod namespace;

pub use controller::{controller_values, ControllerInstaller};
pub use crds::{crd_manifest_url, CrdInstaller, CRD_BUNDLE_NAME};
pub use issuer::{IssuerConfiguration, IssuerProvisioner};
pub use namespace::NamespaceProvisioner;

use crate::backend::ResourceBackend;
use crate::resource::{ResourceDeclaration, ResourceHandle, ResourceKind};
use crate::{Error, Result};

/// Fail with `PrerequisiteNotResolved` unless every handle is resolved
fn require_resolved(step: ResourceKind, handles: &[&ResourceHandle]) -> Result<()> {
    match handles.iter().find(|h| !h.is_resolved()) {
        Some(handle) => Err(Error::prerequisite_not_resolved(step, handle.id())),
        None => Ok(()),
    }
}

/// Submit a declaration, attributing backend failures to its step
async fn submit(
    backend: &dyn ResourceBackend,
    declaration: ResourceDeclaration,
) -> Result<ResourceHandle> {
    let step = declaration.kind;
    backend
        .submit(declaration)
        .await
        .map_err(|e| Error::backend(step, e))
}
