//! Chart rendering through `helm template`
//!
//! Charts are rendered client-side and applied like any other manifest
//! bundle, so no Helm release state lives in the cluster.

use std::io::Write;
use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use certchain_core::{BackendError, ChartSpec};

/// Binary invoked for rendering
pub const HELM_BIN: &str = "helm";

/// Build the `helm template` argument list for `chart`
pub fn template_args(release: &str, chart: &ChartSpec, values_file: &Path) -> Vec<String> {
    vec![
        "template".to_string(),
        release.to_string(),
        chart.chart.clone(),
        "--repo".to_string(),
        chart.repository.clone(),
        "--version".to_string(),
        chart.version.clone(),
        "--namespace".to_string(),
        chart.namespace.clone(),
        "--values".to_string(),
        values_file.display().to_string(),
    ]
}

/// Render `chart` as release `release` and return the manifest text
pub async fn render_chart(release: &str, chart: &ChartSpec) -> Result<String, BackendError> {
    // JSON is a YAML subset, so the values object is written as-is
    let mut values_file = tempfile::Builder::new()
        .prefix("certchain-values-")
        .suffix(".yaml")
        .tempfile()
        .map_err(|e| BackendError::render(&chart.chart, format!("values file: {}", e)))?;
    let values = serde_json::to_vec_pretty(&chart.values)
        .map_err(|e| BackendError::render(&chart.chart, format!("values: {}", e)))?;
    values_file
        .write_all(&values)
        .map_err(|e| BackendError::render(&chart.chart, format!("values file: {}", e)))?;

    let args = template_args(release, chart, values_file.path());
    debug!(chart = %chart.chart, version = %chart.version, "running helm template");

    let output = Command::new(HELM_BIN)
        .args(&args)
        .output()
        .await
        .map_err(|e| BackendError::render(&chart.chart, format!("failed to run helm: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BackendError::render(
            &chart.chart,
            format!("helm template failed: {}", stderr.trim()),
        ));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| BackendError::render(&chart.chart, format!("non-UTF-8 output: {}", e)))
}
