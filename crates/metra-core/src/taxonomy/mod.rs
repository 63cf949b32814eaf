//! Optional read-only lookup from metric name to unit and default buckets.
//!
//! Names with a conventional duration suffix get the canonical ADR-0007 bucket set in the
//! matching unit; explicit entries override the suffix rules.
use std::collections::HashMap;

use metra_model::{ADR0007_BUCKETS_MS, ADR0007_BUCKETS_SECONDS};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl TaxonomyEntry {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            buckets: None,
            help: None,
        }
    }

    pub fn with_buckets(mut self, buckets: &[f64]) -> Self {
        self.buckets = Some(buckets.to_vec());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Name → unit/buckets lookup.
pub trait Taxonomy: Send + Sync {
    fn lookup(&self, name: &str) -> Option<TaxonomyEntry>;

    /// Default histogram buckets for `name`, if the taxonomy defines any.
    fn buckets(&self, name: &str) -> Option<Vec<f64>> {
        self.lookup(name).and_then(|e| e.buckets)
    }
}

/// In-memory taxonomy: explicit entries plus suffix rules.
#[derive(Debug, Clone, Default)]
pub struct StaticTaxonomy {
    entries: HashMap<String, TaxonomyEntry>,
}

impl StaticTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, name: impl Into<String>, entry: TaxonomyEntry) -> Self {
        self.entries.insert(name.into(), entry);
        self
    }

    /// Load explicit entries from a JSON object keyed by metric name.
    ///
    /// ```json
    /// { "queue_wait_seconds": { "unit": "seconds", "buckets": [0.1, 1, 10] } }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let entries: HashMap<String, TaxonomyEntry> =
            serde_json::from_str(json).map_err(|e| CoreError::InvalidTaxonomy(e.to_string()))?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Taxonomy for StaticTaxonomy {
    fn lookup(&self, name: &str) -> Option<TaxonomyEntry> {
        if let Some(entry) = self.entries.get(name) {
            return Some(entry.clone());
        }
        suffix_rule(name)
    }
}

fn suffix_rule(name: &str) -> Option<TaxonomyEntry> {
    if name.ends_with("_seconds") {
        return Some(TaxonomyEntry::new("seconds").with_buckets(&ADR0007_BUCKETS_SECONDS));
    }
    if name.ends_with("_milliseconds") || name.ends_with("_ms") {
        return Some(TaxonomyEntry::new("milliseconds").with_buckets(&ADR0007_BUCKETS_MS));
    }
    if name.ends_with("_bytes") {
        return Some(TaxonomyEntry::new("bytes"));
    }
    if name.ends_with("_total") {
        return Some(TaxonomyEntry::new("count"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_suffixes_get_canonical_buckets() {
        let t = StaticTaxonomy::new();

        let s = t.lookup("refresh_duration_seconds").unwrap();
        assert_eq!(s.unit, "seconds");
        assert_eq!(s.buckets.as_deref(), Some(&ADR0007_BUCKETS_SECONDS[..]));

        assert_eq!(t.buckets("db_query_ms").as_deref(), Some(&ADR0007_BUCKETS_MS[..]));
        assert!(t.buckets("payload_bytes").is_none());
        assert!(t.lookup("temperature").is_none());
    }

    #[test]
    fn explicit_entry_wins_over_suffix() {
        let t = StaticTaxonomy::new().with_entry(
            "queue_wait_seconds",
            TaxonomyEntry::new("seconds").with_buckets(&[1.0, 2.0]),
        );
        assert_eq!(t.buckets("queue_wait_seconds"), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn loads_from_json() {
        let t = StaticTaxonomy::from_json(
            r#"{"jobs_total": {"unit": "jobs", "help": "Jobs processed"}}"#,
        )
        .unwrap();
        let e = t.lookup("jobs_total").unwrap();
        assert_eq!(e.unit, "jobs");
        assert_eq!(e.help.as_deref(), Some("Jobs processed"));
        assert_eq!(t.len(), 1);

        assert!(matches!(
            StaticTaxonomy::from_json("[1,2]"),
            Err(CoreError::InvalidTaxonomy(_))
        ));
    }
}
