//! Resource backend contract
//!
//! The backend owns materialization: it accepts a declaration, refuses to
//! materialize it before its prerequisites are satisfied, and issues the
//! handle. The core never creates handles for backend-owned resources itself.

use std::collections::HashSet;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::BackendError;
use crate::resource::{ResourceDeclaration, ResourceHandle, ResourceKind};

/// Trait for materializing declared resources
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    /// Submit a declaration and return its handle.
    ///
    /// Must not materialize the resource before every prerequisite handle is
    /// satisfied.
    async fn submit(
        &self,
        declaration: ResourceDeclaration,
    ) -> Result<ResourceHandle, BackendError>;
}

/// Build the handle id a backend assigns to its `seq`-th submission
pub fn handle_id(kind: ResourceKind, name: &str, seq: usize) -> String {
    format!("{}/{}#{}", kind, name, seq)
}

/// In-memory backend that records every submission
///
/// Used for dry runs and tests. Handles are resolved on return unless the
/// kind was registered with [`RecordingBackend::leave_pending`]; a kind
/// registered with [`RecordingBackend::fail_on`] fails once.
#[derive(Default)]
pub struct RecordingBackend {
    submitted: Mutex<Vec<ResourceDeclaration>>,
    failures: Mutex<Vec<(ResourceKind, BackendError)>>,
    pending: Mutex<HashSet<ResourceKind>>,
}

impl RecordingBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next submission of `kind` with `error`
    pub fn fail_on(&self, kind: ResourceKind, error: BackendError) {
        self.failures.lock().push((kind, error));
    }

    /// Return handles of `kind` unresolved
    pub fn leave_pending(&self, kind: ResourceKind) {
        self.pending.lock().insert(kind);
    }

    /// Declarations accepted so far, in submission order
    pub fn submitted(&self) -> Vec<ResourceDeclaration> {
        self.submitted.lock().clone()
    }

    /// Number of submissions accepted so far
    pub fn submission_count(&self) -> usize {
        self.submitted.lock().len()
    }
}

#[async_trait]
impl ResourceBackend for RecordingBackend {
    async fn submit(
        &self,
        declaration: ResourceDeclaration,
    ) -> Result<ResourceHandle, BackendError> {
        {
            let mut failures = self.failures.lock();
            if let Some(pos) = failures.iter().position(|(k, _)| *k == declaration.kind) {
                let (_, error) = failures.remove(pos);
                return Err(error);
            }
        }

        if let Some(unresolved) = declaration.unresolved_prerequisite() {
            return Err(BackendError::rejected(format!(
                "{} {} waits on unresolved {}",
                declaration.kind, declaration.name, unresolved
            )));
        }

        let mut submitted = self.submitted.lock();
        let id = handle_id(declaration.kind, &declaration.name, submitted.len() + 1);
        let handle = if self.pending.lock().contains(&declaration.kind) {
            ResourceHandle::pending(id, declaration.kind, &declaration.name)
        } else {
            ResourceHandle::resolved(id, declaration.kind, &declaration.name)
        };

        debug!(id = %handle, kind = %declaration.kind, "recorded declaration");
        submitted.push(declaration);
        Ok(handle)
    }
}
