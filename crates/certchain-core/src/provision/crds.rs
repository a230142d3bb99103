//! CRD bundle installation

use tracing::info;

use super::{require_resolved, submit};
use crate::backend::ResourceBackend;
use crate::config::normalize_version;
use crate::resource::{ResourceDeclaration, ResourceHandle, ResourceKind, ResourceSpec};
use crate::{Result, CRD_MANIFEST_BASE, CRD_MANIFEST_PATH};

/// Name of the CRD bundle declaration
pub const CRD_BUNDLE_NAME: &str = "crds";

/// Location of the CRD bundle for a (normalized) release version
pub fn crd_manifest_url(version: &str) -> String {
    format!("{}/v{}/{}", CRD_MANIFEST_BASE, version, CRD_MANIFEST_PATH)
}

/// Declares the CRD bundle as a remote manifest the backend fetches
pub struct CrdInstaller<'a> {
    backend: &'a dyn ResourceBackend,
}

impl<'a> CrdInstaller<'a> {
    /// Create an installer submitting to `backend`
    pub fn new(backend: &'a dyn ResourceBackend) -> Self {
        Self { backend }
    }

    /// Declare the CRD bundle for `version`, after `namespace`
    pub async fn install(
        &self,
        version: &str,
        namespace: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        let version = normalize_version(version)?;
        require_resolved(ResourceKind::CrdBundle, &[namespace])?;

        let url = crd_manifest_url(&version);
        info!(version = %version, url = %url, "declaring CRD bundle");

        let declaration = ResourceDeclaration::new(
            ResourceKind::CrdBundle,
            CRD_BUNDLE_NAME,
            ResourceSpec::RemoteManifest { url },
        )
        .depends_on(namespace);
        submit(self.backend, declaration).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockResourceBackend;
    use crate::Error;

    fn namespace() -> ResourceHandle {
        ResourceHandle::resolved("ns-1", ResourceKind::Namespace, "cert-manager")
    }

    #[test]
    fn url_is_versioned() {
        assert_eq!(
            crd_manifest_url("1.2.3"),
            "https://raw.githubusercontent.com/jetstack/cert-manager/v1.2.3/deploy/manifests/00-crds.yaml"
        );
    }

    #[tokio::test]
    async fn declares_remote_manifest_after_namespace() {
        let mut backend = MockResourceBackend::new();
        backend
            .expect_submit()
            .withf(|d| {
                d.kind == ResourceKind::CrdBundle
                    && d.name == CRD_BUNDLE_NAME
                    && d.prerequisite_ids() == vec!["ns-1"]
                    && d.spec
                        == ResourceSpec::RemoteManifest {
                            url: crd_manifest_url("1.2.3"),
                        }
            })
            .times(1)
            .returning(|d| Ok(ResourceHandle::resolved("crds-2", d.kind, d.name)));

        let handle = CrdInstaller::new(&backend)
            .install("v1.2.3", &namespace())
            .await
            .unwrap();
        assert_eq!(handle.kind(), ResourceKind::CrdBundle);
    }

    #[tokio::test]
    async fn empty_version_fails_before_backend() {
        let mut backend = MockResourceBackend::new();
        backend.expect_submit().never();

        let err = CrdInstaller::new(&backend)
            .install("", &namespace())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
    }

    #[tokio::test]
    async fn unresolved_namespace_is_rejected() {
        let mut backend = MockResourceBackend::new();
        backend.expect_submit().never();

        let pending = ResourceHandle::pending("ns-1", ResourceKind::Namespace, "cert-manager");
        let err = CrdInstaller::new(&backend)
            .install("1.2.3", &pending)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PrerequisiteNotResolved { step: ResourceKind::CrdBundle, .. }
        ));
    }
}
