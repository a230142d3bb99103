//! Controller install namespace

use tracing::info;

use super::submit;
use crate::backend::ResourceBackend;
use crate::resource::{ResourceDeclaration, ResourceHandle, ResourceKind, ResourceSpec};
use crate::Result;

/// Declares the namespace the controller lives in
pub struct NamespaceProvisioner<'a> {
    backend: &'a dyn ResourceBackend,
}

impl<'a> NamespaceProvisioner<'a> {
    /// Create a provisioner submitting to `backend`
    pub fn new(backend: &'a dyn ResourceBackend) -> Self {
        Self { backend }
    }

    /// Declare namespace `name`; it has no prerequisites
    pub async fn declare(&self, name: &str) -> Result<ResourceHandle> {
        info!(namespace = %name, "declaring namespace");
        let declaration =
            ResourceDeclaration::new(ResourceKind::Namespace, name, ResourceSpec::Namespace);
        submit(self.backend, declaration).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockResourceBackend;
    use crate::error::BackendError;
    use crate::Error;

    #[tokio::test]
    async fn declares_namespace_without_prerequisites() {
        let mut backend = MockResourceBackend::new();
        backend
            .expect_submit()
            .withf(|d| {
                d.kind == ResourceKind::Namespace
                    && d.name == "cert-manager"
                    && d.spec == ResourceSpec::Namespace
                    && d.prerequisites.is_empty()
            })
            .times(1)
            .returning(|d| Ok(ResourceHandle::resolved("ns-1", d.kind, d.name)));

        let handle = NamespaceProvisioner::new(&backend)
            .declare("cert-manager")
            .await
            .unwrap();
        assert_eq!(handle.id(), "ns-1");
        assert_eq!(handle.kind(), ResourceKind::Namespace);
    }

    #[tokio::test]
    async fn surfaces_backend_failure_unchanged() {
        let mut backend = MockResourceBackend::new();
        backend
            .expect_submit()
            .returning(|_| Err(BackendError::rejected("namespaces is forbidden")));

        let err = NamespaceProvisioner::new(&backend)
            .declare("cert-manager")
            .await
            .unwrap_err();
        match err {
            Error::Backend { step, source } => {
                assert_eq!(step, ResourceKind::Namespace);
                assert!(source.to_string().contains("namespaces is forbidden"));
            }
            other => panic!("expected Backend error, got {other:?}"),
        }
    }
}
