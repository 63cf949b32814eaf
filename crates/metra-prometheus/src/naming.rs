//! Exposition naming rules.
//!
//! Metric names: `^[a-zA-Z_:][a-zA-Z0-9_:]*$`. Label names: `^[a-zA-Z_][a-zA-Z0-9_]*$`, minus the
//! reserved `__` prefix.
use crate::error::ExporterError;

pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !name.starts_with("__")
}

pub fn validate_metric_name(name: &str) -> Result<(), ExporterError> {
    if is_valid_metric_name(name) {
        Ok(())
    } else {
        Err(ExporterError::InvalidMetricName(name.to_string()))
    }
}

pub fn validate_label_name(metric: &str, label: &str) -> Result<(), ExporterError> {
    if is_valid_label_name(label) {
        Ok(())
    } else {
        Err(ExporterError::InvalidLabelName {
            metric: metric.to_string(),
            label: label.to_string(),
        })
    }
}

/// Join `{namespace}_{subsystem}_{name}`, skipping empty parts.
pub fn format_metric_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Map an arbitrary identifier (vendor, binary name) onto `[a-zA-Z0-9_]`.
///
/// Leading digits get an underscore prefix so the result can start a metric name.
pub fn sanitize(raw: &str) -> String {
    let mut out: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
