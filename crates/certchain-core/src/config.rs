//! Provisioning inputs: per-run request and process-wide defaults
//!
//! Defaults are read once at process start and injected into the
//! orchestrator; nothing here is consulted after a run begins.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, DEFAULT_CHART_REPOSITORY, DEFAULT_CONTROLLER_VERSION};

/// Environment variable overriding the default controller version
pub const CONTROLLER_VERSION_ENV: &str = "CERTCHAIN_CONTROLLER_VERSION";
/// Environment variable overriding the default staging flag
pub const STAGING_ENV: &str = "CERTCHAIN_STAGING";
/// Environment variable overriding the default chart repository
pub const CHART_REPOSITORY_ENV: &str = "CERTCHAIN_CHART_REPOSITORY";

/// Process-wide defaults, immutable after construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningDefaults {
    /// Controller (and CRD bundle) version used when a request pins none
    pub controller_version: String,
    /// Whether requests that don't choose an endpoint use ACME staging
    pub staging: bool,
    /// Chart repository used when a request doesn't override it
    pub chart_repository: String,
}

impl Default for ProvisioningDefaults {
    fn default() -> Self {
        Self {
            controller_version: DEFAULT_CONTROLLER_VERSION.to_string(),
            staging: false,
            chart_repository: DEFAULT_CHART_REPOSITORY.to_string(),
        }
    }
}

impl ProvisioningDefaults {
    /// Read defaults from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build defaults from an arbitrary key lookup
    ///
    /// Unset or empty values fall back to the built-in defaults. The staging
    /// flag accepts `1/true/yes/on` (case-insensitive); anything else is false.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let fallback = Self::default();

        Self {
            controller_version: get(CONTROLLER_VERSION_ENV)
                .map(|v| v.trim().to_string())
                .unwrap_or(fallback.controller_version),
            staging: get(STAGING_ENV)
                .map(|v| parse_flag(&v))
                .unwrap_or(fallback.staging),
            chart_repository: get(CHART_REPOSITORY_ENV)
                .map(|v| v.trim().to_string())
                .unwrap_or(fallback.chart_repository),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parameters of one provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    /// Cloud project the DNS-01 solver operates in
    pub project: String,
    /// Contact email registered with the ACME account
    pub contact_email: String,
    /// Use the ACME staging endpoint; `None` defers to process defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_staging_endpoint: Option<bool>,
    /// Chart repository override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repository: Option<String>,
    /// Controller version override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_version: Option<String>,
}

impl ProvisioningRequest {
    /// Create a request that takes every optional setting from the defaults
    pub fn new(project: impl Into<String>, contact_email: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            contact_email: contact_email.into(),
            use_staging_endpoint: None,
            source_repository: None,
            controller_version: None,
        }
    }

    /// Choose the ACME endpoint explicitly
    pub fn with_staging(mut self, staging: bool) -> Self {
        self.use_staging_endpoint = Some(staging);
        self
    }

    /// Pin the controller version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.controller_version = Some(version.into());
        self
    }

    /// Override the chart repository
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.source_repository = Some(repository.into());
        self
    }

    /// Check the fields every run needs
    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(Error::precondition("project", "must not be empty"));
        }
        if self.contact_email.trim().is_empty() {
            return Err(Error::precondition("contact_email", "must not be empty"));
        }
        if let Some(repo) = &self.source_repository {
            if repo.trim().is_empty() {
                return Err(Error::precondition(
                    "source_repository",
                    "must not be empty when set",
                ));
            }
        }
        Ok(())
    }

    /// Version to install: the request's pin, else the default
    pub fn effective_version<'a>(&'a self, defaults: &'a ProvisioningDefaults) -> &'a str {
        self.controller_version
            .as_deref()
            .unwrap_or(&defaults.controller_version)
    }

    /// Whether the issuer targets ACME staging
    pub fn effective_staging(&self, defaults: &ProvisioningDefaults) -> bool {
        self.use_staging_endpoint.unwrap_or(defaults.staging)
    }

    /// Chart repository to install from
    pub fn effective_repository<'a>(&'a self, defaults: &'a ProvisioningDefaults) -> &'a str {
        self.source_repository
            .as_deref()
            .unwrap_or(&defaults.chart_repository)
    }
}

/// Validate a release version and return it without a leading `v`
///
/// Versions must be valid semantic versions; `v1.2.3` and `1.2.3` are
/// equivalent.
pub fn normalize_version(version: &str) -> Result<String> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        return Err(Error::precondition("controller_version", "must not be empty"));
    }
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    semver::Version::parse(bare).map_err(|e| {
        Error::precondition(
            "controller_version",
            format!("'{}' is not a semantic version: {}", version, e),
        )
    })?;
    Ok(bare.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let defaults = ProvisioningDefaults::from_lookup(lookup(&[]));
        assert_eq!(defaults, ProvisioningDefaults::default());
        assert_eq!(defaults.controller_version, DEFAULT_CONTROLLER_VERSION);
        assert!(!defaults.staging);
        assert_eq!(defaults.chart_repository, DEFAULT_CHART_REPOSITORY);
    }

    #[test]
    fn environment_overrides_defaults() {
        let defaults = ProvisioningDefaults::from_lookup(lookup(&[
            (CONTROLLER_VERSION_ENV, " 1.2.3 "),
            (STAGING_ENV, "Yes"),
            (CHART_REPOSITORY_ENV, "https://charts.internal"),
        ]));
        assert_eq!(defaults.controller_version, "1.2.3");
        assert!(defaults.staging);
        assert_eq!(defaults.chart_repository, "https://charts.internal");
    }

    #[test]
    fn empty_environment_values_are_ignored() {
        let defaults = ProvisioningDefaults::from_lookup(lookup(&[
            (CONTROLLER_VERSION_ENV, ""),
            (STAGING_ENV, "  "),
        ]));
        assert_eq!(defaults, ProvisioningDefaults::default());
    }

    #[test]
    fn unrecognized_staging_value_is_false() {
        let defaults = ProvisioningDefaults::from_lookup(lookup(&[(STAGING_ENV, "maybe")]));
        assert!(!defaults.staging);
    }

    #[test]
    fn request_falls_back_to_defaults() {
        let defaults = ProvisioningDefaults {
            controller_version: "0.15.0".to_string(),
            staging: true,
            chart_repository: "https://mirror.example".to_string(),
        };
        let request = ProvisioningRequest::new("proj", "ops@example.com");

        assert_eq!(request.effective_version(&defaults), "0.15.0");
        assert!(request.effective_staging(&defaults));
        assert_eq!(request.effective_repository(&defaults), "https://mirror.example");
    }

    #[test]
    fn explicit_request_fields_win() {
        let defaults = ProvisioningDefaults {
            staging: true,
            ..Default::default()
        };
        let request = ProvisioningRequest::new("proj", "ops@example.com")
            .with_staging(false)
            .with_version("1.2.3")
            .with_repository("https://charts.example");

        assert!(!request.effective_staging(&defaults));
        assert_eq!(request.effective_version(&defaults), "1.2.3");
        assert_eq!(request.effective_repository(&defaults), "https://charts.example");
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let err = ProvisioningRequest::new(" ", "ops@example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Precondition { ref field, .. } if field == "project"));

        let err = ProvisioningRequest::new("proj", "")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Precondition { ref field, .. } if field == "contact_email"));

        let err = ProvisioningRequest::new("proj", "ops@example.com")
            .with_repository("")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Precondition { ref field, .. } if field == "source_repository"));
    }

    #[test]
    fn normalize_version_accepts_optional_prefix() {
        assert_eq!(normalize_version("1.2.3").unwrap(), "1.2.3");
        assert_eq!(normalize_version("v1.2.3").unwrap(), "1.2.3");
        assert_eq!(normalize_version("1.0.0-alpha.1").unwrap(), "1.0.0-alpha.1");
    }

    #[test]
    fn normalize_version_rejects_garbage() {
        assert!(normalize_version("").is_err());
        assert!(normalize_version("latest").is_err());
        assert!(normalize_version("1.2").is_err());
    }

    #[test]
    fn request_serde_omits_unset_overrides() {
        let json = serde_json::to_value(ProvisioningRequest::new("proj", "ops@example.com")).unwrap();
        assert_eq!(json["contactEmail"], "ops@example.com");
        assert!(json.get("useStagingEndpoint").is_none());
        assert!(json.get("controllerVersion").is_none());
    }
}
