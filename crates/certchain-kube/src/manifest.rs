//! Manifest bundles: parsing and apply ordering

use serde_json::Value;

use certchain_core::BackendError;

use crate::yaml::parse_documents;

/// Parse a multi-document manifest into Kubernetes objects.
///
/// Documents without a `kind` (rendered chart comments, notes, empty
/// templates) are dropped.
pub fn parse_objects(source: &str, manifest: &str) -> Result<Vec<Value>, BackendError> {
    let docs = parse_documents(manifest)
        .map_err(|e| BackendError::fetch(source, format!("invalid YAML: {}", e)))?;
    Ok(docs
        .into_iter()
        .filter(|doc| !object_kind(doc).is_empty())
        .collect())
}

/// Kind of a parsed object, empty when absent
pub fn object_kind(obj: &Value) -> &str {
    obj.get("kind").and_then(Value::as_str).unwrap_or_default()
}

/// `metadata.name` of a parsed object
pub fn object_name(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/name").and_then(Value::as_str)
}

/// Get priority for a Kubernetes resource kind (lower = apply first)
///
/// Webhook configurations go last: they point at a Service whose pods must
/// exist before the API server starts calling them.
pub fn kind_priority(kind: &str) -> u8 {
    match kind {
        "Namespace" => 0,
        "CustomResourceDefinition" => 1,
        "ServiceAccount" => 2,
        "ClusterRole" | "Role" => 3,
        "ClusterRoleBinding" | "RoleBinding" => 4,
        "ConfigMap" | "Secret" => 5,
        "Service" => 7,
        "Deployment" | "DaemonSet" | "StatefulSet" | "Job" => 8,
        "MutatingWebhookConfiguration" | "ValidatingWebhookConfiguration" => 9,
        _ => 6,
    }
}

/// Split objects into the two apply phases, each sorted by kind priority.
///
/// The first phase holds Namespaces and CRDs, which must exist before the
/// second phase can be resolved through discovery. Document order is kept
/// within a kind.
pub fn apply_phases(objects: &[Value]) -> (Vec<&Value>, Vec<&Value>) {
    let (mut foundational, mut rest): (Vec<&Value>, Vec<&Value>) = objects
        .iter()
        .partition(|o| matches!(object_kind(o), "Namespace" | "CustomResourceDefinition"));
    foundational.sort_by_key(|o| kind_priority(object_kind(o)));
    rest.sort_by_key(|o| kind_priority(object_kind(o)));
    (foundational, rest)
}

/// Names of every CustomResourceDefinition in `objects`
pub fn crd_names(objects: &[Value]) -> Vec<&str> {
    objects
        .iter()
        .filter(|o| object_kind(o) == "CustomResourceDefinition")
        .filter_map(object_name)
        .collect()
}
