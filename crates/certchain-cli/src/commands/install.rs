//! Install command - provision cert-manager on a live cluster
//!
//! Submits the namespace, CRD bundle, controller chart and ClusterIssuer in
//! order. Ctrl-C stops the run before the next step; anything already
//! applied stays in place and a rerun converges.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use certchain_core::{Orchestrator, ProvisioningDefaults};
use certchain_kube::{KubeBackend, KubeBackendConfig};

use super::RequestArgs;
use crate::Result;

/// Provision cert-manager and its ClusterIssuer
#[derive(Args, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Path to kubeconfig; inferred when unset
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Seconds to wait for CRDs and controller Deployments to become ready
    #[arg(long, default_value = "300")]
    pub readiness_timeout_secs: u64,
}

impl InstallArgs {
    /// Backend settings derived from the flags
    pub fn backend_config(&self) -> KubeBackendConfig {
        KubeBackendConfig {
            kubeconfig: self.kubeconfig.clone(),
            readiness_timeout: Duration::from_secs(self.readiness_timeout_secs),
            ..KubeBackendConfig::default()
        }
    }
}

pub async fn run(args: InstallArgs, defaults: ProvisioningDefaults) -> Result<()> {
    let backend = KubeBackend::connect(args.backend_config()).await?;
    let orchestrator = Orchestrator::new(&args.request.name, defaults, Arc::new(backend));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current step");
            on_signal.cancel();
        }
    });

    match orchestrator
        .run_until_cancelled(&args.request.to_request(), cancel)
        .await
    {
        Ok(result) => {
            info!(issuer = %result.issuer.name(), "install complete");
            println!("{}", result.issuer.name());
            Ok(())
        }
        Err(e) => {
            error!(step = ?e.step(), error = %e, "install failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_config_carries_flags() {
        let args = InstallArgs {
            request: RequestArgs {
                name: "materya".to_string(),
                project: "proj".to_string(),
                email: "ops@example.com".to_string(),
                staging: None,
                controller_version: None,
                repository: None,
            },
            kubeconfig: Some(PathBuf::from("/tmp/kubeconfig")),
            readiness_timeout_secs: 60,
        };
        let config = args.backend_config();
        assert_eq!(config.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
        assert_eq!(config.readiness_timeout, Duration::from_secs(60));
        assert_eq!(config.field_manager, certchain_kube::FIELD_MANAGER);
    }
}
