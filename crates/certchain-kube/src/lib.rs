//! Kubernetes backend for certchain
//!
//! [`KubeBackend`] materializes declarations on a live cluster: namespaces
//! and typed objects by server-side apply, remote manifest bundles by
//! download and apply, charts by `helm template` and apply.

pub mod backend;
pub mod fetch;
pub mod helm;
pub mod kube_utils;
pub mod manifest;
pub mod retry;
pub mod yaml;

pub use backend::{KubeBackend, KubeBackendConfig, DEFAULT_READINESS_TIMEOUT, FIELD_MANAGER};
pub use retry::{retry_with_backoff, RetryConfig};
