//! Error types for certchain provisioning
//!
//! Errors carry the step that failed so a run can report where the chain
//! stopped. Backend failures are wrapped, never rewritten.

use thiserror::Error;

use crate::resource::ResourceKind;

/// Main error type for a provisioning run
#[derive(Debug, Error)]
pub enum Error {
    /// A required input was missing or malformed; caught before any backend call
    #[error("precondition failed for {field}: {message}")]
    Precondition {
        /// The offending request field (e.g., "contact_email")
        field: String,
        /// Description of what's invalid
        message: String,
    },

    /// A step was invoked with a prerequisite handle that is not resolved
    #[error("prerequisite {prerequisite} not resolved for {step}")]
    PrerequisiteNotResolved {
        /// Step that was invoked too early
        step: ResourceKind,
        /// Id of the unresolved prerequisite handle
        prerequisite: String,
    },

    /// The resource backend rejected or failed a submission
    #[error("backend error at {step}: {source}")]
    Backend {
        /// Step whose submission failed
        step: ResourceKind,
        /// The underlying backend failure
        #[source]
        source: BackendError,
    },

    /// The run was cancelled before the step could complete
    #[error("provisioning cancelled at {step}")]
    Cancelled {
        /// First step that did not complete
        step: ResourceKind,
    },
}

impl Error {
    /// Create a precondition error for a request field
    pub fn precondition(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Precondition {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a prerequisite error for the given step and handle id
    pub fn prerequisite_not_resolved(step: ResourceKind, prerequisite: impl Into<String>) -> Self {
        Self::PrerequisiteNotResolved {
            step,
            prerequisite: prerequisite.into(),
        }
    }

    /// Wrap a backend failure with the step it happened in
    pub fn backend(step: ResourceKind, source: BackendError) -> Self {
        Self::Backend { step, source }
    }

    /// The step this error is attributed to, if any
    ///
    /// Precondition errors happen before any step starts.
    pub fn step(&self) -> Option<ResourceKind> {
        match self {
            Error::Precondition { .. } => None,
            Error::PrerequisiteNotResolved { step, .. } => Some(*step),
            Error::Backend { step, .. } => Some(*step),
            Error::Cancelled { step } => Some(*step),
        }
    }

    /// Check if re-running the provisioning could succeed without a config fix
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Precondition { .. } => false,
            Error::PrerequisiteNotResolved { .. } => false,
            Error::Backend { source, .. } => source.is_retryable(),
            Error::Cancelled { .. } => true,
        }
    }
}

/// Failure reported by a resource backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Remote artifact could not be retrieved
    #[error("fetch of {url} failed: {message}")]
    Fetch {
        /// Location that was fetched
        url: String,
        /// Description of what failed
        message: String,
    },

    /// Chart could not be rendered into manifests
    #[error("render of chart {chart} failed: {message}")]
    Render {
        /// Chart being rendered
        chart: String,
        /// Description of what failed
        message: String,
    },

    /// An object could not be applied to the cluster
    #[error("apply of {kind}/{name} failed: {message}")]
    Apply {
        /// Kind of the object
        kind: String,
        /// Name of the object
        name: String,
        /// Description of what failed
        message: String,
    },

    /// The backend refused the declaration outright
    #[error("declaration rejected: {message}")]
    Rejected {
        /// Why the declaration was refused
        message: String,
    },

    /// Materialization did not finish in time
    #[error("timed out: {message}")]
    Timeout {
        /// What was being waited on
        message: String,
    },
}

impl BackendError {
    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a chart render error
    pub fn render(chart: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Render {
            chart: chart.into(),
            message: msg.into(),
        }
    }

    /// Create an apply error for a specific object
    pub fn apply(kind: impl Into<String>, name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Apply {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected {
            message: msg.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout {
            message: msg.into(),
        }
    }

    /// Check if this failure is transient
    ///
    /// Kubernetes 4xx responses (name collision, permission denied, invalid
    /// object) need an operator to intervene; everything else may pass on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            BackendError::Fetch { .. } => true,
            BackendError::Render { .. } => false,
            BackendError::Apply { .. } => true,
            BackendError::Rejected { .. } => false,
            BackendError::Timeout { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: a malformed request is reported before anything is provisioned
    #[test]
    fn story_precondition_names_the_field() {
        let err = Error::precondition("contact_email", "must not be empty");
        assert!(err.to_string().contains("contact_email"));
        assert!(err.to_string().contains("must not be empty"));
        assert_eq!(err.step(), None);
        assert!(!err.is_retryable());
    }

    /// Story: the failing step is visible in backend errors
    #[test]
    fn story_backend_error_identifies_step() {
        let err = Error::backend(
            ResourceKind::CrdBundle,
            BackendError::fetch("https://example.invalid/crds.yaml", "connection reset"),
        );
        assert_eq!(err.step(), Some(ResourceKind::CrdBundle));
        assert!(err.to_string().contains("CRDBundle"));
        assert!(err.to_string().contains("connection reset"));
        assert!(err.is_retryable());
    }

    #[test]
    fn prerequisite_error_is_a_contract_violation() {
        let err = Error::prerequisite_not_resolved(ResourceKind::ControllerApp, "Namespace/cert-manager#1");
        assert_eq!(err.step(), Some(ResourceKind::ControllerApp));
        assert!(err.to_string().contains("Namespace/cert-manager#1"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn backend_retryability() {
        assert!(!BackendError::rejected("prerequisite pending").is_retryable());
        assert!(!BackendError::render("cert-manager", "bad values").is_retryable());
        assert!(BackendError::timeout("deployments not available").is_retryable());
        assert!(BackendError::apply("Namespace", "cert-manager", "conflict").is_retryable());
    }

    #[test]
    fn kube_client_errors_are_not_retryable() {
        let forbidden = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "namespaces is forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        });
        assert!(!BackendError::from(forbidden).is_retryable());

        let unavailable = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "etcdserver: leader changed".to_string(),
            reason: "ServiceUnavailable".to_string(),
            code: 503,
        });
        assert!(BackendError::from(unavailable).is_retryable());
    }

    #[test]
    fn cancelled_reports_step() {
        let err = Error::Cancelled {
            step: ResourceKind::ClusterIssuer,
        };
        assert!(err.to_string().contains("cancelled at ClusterIssuer"));
    }
}
