use std::sync::Arc;

use metra_core::Taxonomy;
use metra_model::Labels;
use tracing::debug;

use crate::error::ExporterError;
use crate::naming::{format_metric_name, is_valid_label_name, is_valid_metric_name, sanitize};

pub const DEFAULT_NAMESPACE: &str = "app";
pub const DEFAULT_SUBSYSTEM: &str = "metrics";

/// Namespace/subsystem pair supplied by the application's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub namespace: String,
    pub subsystem: String,
}

impl AppIdentity {
    /// Build an identity from a vendor and binary name, sanitized for use in metric names.
    pub fn from_vendor(vendor: &str, binary: &str) -> Self {
        Self {
            namespace: sanitize(vendor),
            subsystem: sanitize(binary),
        }
    }
}

/// Optional provider of the application identity. Absence is not an error.
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Option<AppIdentity>;
}

impl IdentityProvider for AppIdentity {
    fn identity(&self) -> Option<AppIdentity> {
        Some(self.clone())
    }
}

/// Identity read from `METRA_VENDOR` and `METRA_BINARY`.
///
/// The binary name falls back to the running executable's file stem; without a vendor there is
/// no identity.
#[derive(Debug, Clone, Default)]
pub struct EnvIdentity;

impl IdentityProvider for EnvIdentity {
    fn identity(&self) -> Option<AppIdentity> {
        let vendor = std::env::var("METRA_VENDOR").ok().filter(|v| !v.trim().is_empty())?;
        let binary = std::env::var("METRA_BINARY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            })?;
        Some(AppIdentity::from_vendor(&vendor, &binary))
    }
}

#[derive(Clone)]
pub struct ExporterConfig {
    pub namespace: String,
    pub subsystem: String,
    /// Labels added to every exported series; series tags override them.
    pub default_labels: Labels,
    /// Used for HELP text.
    pub taxonomy: Option<Arc<dyn Taxonomy>>,
    /// Emit self-instrumentation into the exported source.
    pub instrument: bool,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            subsystem: DEFAULT_SUBSYSTEM.to_string(),
            default_labels: Labels::new(),
            taxonomy: None,
            instrument: true,
        }
    }
}

impl std::fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("namespace", &self.namespace)
            .field("subsystem", &self.subsystem)
            .field("default_labels", &self.default_labels)
            .field("taxonomy", &self.taxonomy.is_some())
            .field("instrument", &self.instrument)
            .finish()
    }
}

impl ExporterConfig {
    /// Defaults, with namespace/subsystem taken from `provider` when it has an identity.
    pub fn from_identity(provider: &dyn IdentityProvider) -> Self {
        match provider.identity() {
            Some(id) => {
                debug!(namespace = %id.namespace, subsystem = %id.subsystem, "app identity resolved");
                Self {
                    namespace: id.namespace,
                    subsystem: id.subsystem,
                    ..Self::default()
                }
            }
            None => {
                debug!("no app identity; using default namespace");
                Self::default()
            }
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    pub fn with_default_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_labels.insert(key, value);
        self
    }

    pub fn with_taxonomy(mut self, taxonomy: Arc<dyn Taxonomy>) -> Self {
        self.taxonomy = Some(taxonomy);
        self
    }

    pub fn with_instrument(mut self, instrument: bool) -> Self {
        self.instrument = instrument;
        self
    }

    /// Exposition name of a registry metric.
    pub fn metric_name(&self, name: &str) -> String {
        format_metric_name(&self.namespace, &self.subsystem, name)
    }

    pub fn validate(&self) -> Result<(), ExporterError> {
        let prefix = format_metric_name(&self.namespace, &self.subsystem, "");
        if !prefix.is_empty() && !is_valid_metric_name(&prefix) {
            return Err(ExporterError::InvalidConfig(format!(
                "namespace/subsystem '{prefix}' is not a valid metric name prefix"
            )));
        }
        if let Some(bad) = self.default_labels.keys().find(|k| !is_valid_label_name(k)) {
            return Err(ExporterError::InvalidConfig(format!(
                "default label '{bad}' is not a valid label name"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoIdentity;

    impl IdentityProvider for NoIdentity {
        fn identity(&self) -> Option<AppIdentity> {
            None
        }
    }

    #[test]
    fn identity_overrides_defaults() {
        let cfg = ExporterConfig::from_identity(&AppIdentity::from_vendor("Acme", "billing-api"));
        assert_eq!(cfg.namespace, "acme");
        assert_eq!(cfg.subsystem, "billing_api");
        assert_eq!(cfg.metric_name("up"), "acme_billing_api_up");
    }

    #[test]
    fn missing_identity_falls_back() {
        let cfg = ExporterConfig::from_identity(&NoIdentity);
        assert_eq!(cfg.namespace, DEFAULT_NAMESPACE);
        assert_eq!(cfg.subsystem, DEFAULT_SUBSYSTEM);
    }

    #[test]
    fn validate_checks_prefix_and_labels() {
        assert!(ExporterConfig::default().validate().is_ok());
        assert!(
            ExporterConfig::default()
                .with_namespace("my-app")
                .validate()
                .is_err()
        );
        assert!(
            ExporterConfig::default()
                .with_default_label("1env", "prod")
                .validate()
                .is_err()
        );
    }
}
