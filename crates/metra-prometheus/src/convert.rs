//! Snapshot → collector plan.
//!
//! Everything here is pure: the whole snapshot is validated and shaped before the upstream client
//! is touched, so a rejected refresh leaves registered collectors as they were.
use std::collections::{BTreeMap, BTreeSet, HashSet};

use metra_model::{Labels, MetricKind, MetricValue, MetricsEvent};

use crate::config::ExporterConfig;
use crate::error::ExporterError;
use crate::naming::{validate_label_name, validate_metric_name};
use crate::reconstruct::{Observation, reconstruct};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SampleValue {
    Scalar(f64),
    Observations(Vec<Observation>),
}

#[derive(Debug, Clone)]
pub(crate) struct Sample {
    pub labels: Labels,
    pub value: SampleValue,
}

/// One upstream collector and the series it should hold after the refresh.
#[derive(Debug, Clone)]
pub(crate) struct Family {
    pub kind: MetricKind,
    pub help: String,
    /// Sorted union of label keys across samples.
    pub label_names: Vec<String>,
    /// Histogram upper bounds; empty for scalars.
    pub bounds: Vec<f64>,
    pub samples: Vec<Sample>,
}

impl Family {
    /// Label values of `sample` in `label_names` order; absent keys become empty strings.
    pub fn label_values<'a>(&'a self, sample: &'a Sample) -> Vec<&'a str> {
        self.label_names
            .iter()
            .map(|k| sample.labels.get(k).unwrap_or(""))
            .collect()
    }
}

pub(crate) type Plan = BTreeMap<String, Family>;

pub(crate) fn plan(events: &[MetricsEvent], config: &ExporterConfig) -> Result<Plan, ExporterError> {
    let mut families = Plan::new();
    let mut seen: HashSet<(String, Labels)> = HashSet::new();

    for event in events {
        let name = config.metric_name(&event.name);
        validate_metric_name(&name)?;

        let labels = config.default_labels.merged(&event.tags);
        for key in labels.keys() {
            validate_label_name(&name, key)?;
            if key == "le" && event.kind() == MetricKind::Histogram {
                return Err(ExporterError::InvalidLabelName {
                    metric: name,
                    label: key.to_string(),
                });
            }
        }

        if !seen.insert((name.clone(), labels.clone())) {
            return Err(invalid(&name, "duplicate series in snapshot"));
        }

        let family = families.entry(name.clone()).or_insert_with(|| Family {
            kind: event.kind(),
            help: help_for(&event.name, config),
            label_names: Vec::new(),
            bounds: Vec::new(),
            samples: Vec::new(),
        });
        if family.kind != event.kind() {
            return Err(ExporterError::KindConflict {
                metric: name,
                first: family.kind,
                second: event.kind(),
            });
        }

        let value = match &event.value {
            MetricValue::Counter(v) => {
                if !v.is_finite() || *v < 0.0 {
                    return Err(invalid(&name, "counter value must be finite and non-negative"));
                }
                SampleValue::Scalar(*v)
            }
            MetricValue::Gauge(v) => SampleValue::Scalar(*v),
            MetricValue::Histogram(summary) => {
                if summary.buckets.is_empty() {
                    return Err(invalid(&name, "histogram summary has no buckets"));
                }
                if !summary.is_well_formed() {
                    return Err(invalid(
                        &name,
                        "bucket bounds must be finite and increasing with non-decreasing counts",
                    ));
                }
                let bounds = summary.bounds();
                if family.samples.is_empty() {
                    family.bounds = bounds;
                } else if family.bounds != bounds {
                    return Err(invalid(&name, "bucket bounds differ between series"));
                }
                SampleValue::Observations(reconstruct(summary))
            }
        };

        family.samples.push(Sample { labels, value });
    }

    for family in families.values_mut() {
        let keys: BTreeSet<&str> = family.samples.iter().flat_map(|s| s.labels.keys()).collect();
        family.label_names = keys.into_iter().map(str::to_string).collect();
    }
    Ok(families)
}

fn invalid(metric: &str, reason: &str) -> ExporterError {
    ExporterError::InvalidValue {
        metric: metric.to_string(),
        reason: reason.to_string(),
    }
}

fn help_for(name: &str, config: &ExporterConfig) -> String {
    match config.taxonomy.as_ref().and_then(|t| t.lookup(name)) {
        Some(entry) => entry
            .help
            .unwrap_or_else(|| format!("{name} ({})", entry.unit)),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use metra_core::StaticTaxonomy;
    use metra_model::HistogramSummary;

    use super::*;

    fn cfg() -> ExporterConfig {
        ExporterConfig::default()
            .with_namespace("ns")
            .with_subsystem("sub")
    }

    #[test]
    fn groups_series_and_unions_labels() {
        let events = vec![
            MetricsEvent::counter("requests_total", 1.0, Labels::new()),
            MetricsEvent::counter("requests_total", 2.0, Labels::single("status", "200")),
            MetricsEvent::counter("requests_total", 3.0, Labels::single("method", "GET")),
        ];
        let plan = plan(&events, &cfg()).unwrap();
        let family = &plan["ns_sub_requests_total"];

        assert_eq!(family.kind, MetricKind::Counter);
        assert_eq!(family.label_names, vec!["method", "status"]);
        assert_eq!(family.samples.len(), 3);
        assert_eq!(family.label_values(&family.samples[1]), vec!["", "200"]);
    }

    #[test]
    fn default_labels_are_overridden_by_tags() {
        let config = cfg().with_default_label("env", "prod");
        let events = vec![
            MetricsEvent::gauge("temp", 1.0, Labels::new()),
            MetricsEvent::gauge("temp", 2.0, Labels::single("env", "dev")),
        ];
        let plan = plan(&events, &config).unwrap();
        let family = &plan["ns_sub_temp"];

        assert_eq!(family.label_names, vec!["env"]);
        assert_eq!(family.samples[0].labels.get("env"), Some("prod"));
        assert_eq!(family.samples[1].labels.get("env"), Some("dev"));
    }

    #[test]
    fn duplicate_series_after_merge_is_rejected() {
        let config = cfg().with_default_label("env", "prod");
        let events = vec![
            MetricsEvent::gauge("temp", 1.0, Labels::new()),
            MetricsEvent::gauge("temp", 2.0, Labels::single("env", "prod")),
        ];
        assert!(matches!(
            plan(&events, &config),
            Err(ExporterError::InvalidValue { .. })
        ));
    }

    #[test]
    fn label_values_with_separators_stay_distinct() {
        let events = vec![
            MetricsEvent::counter("hits_total", 1.0, Labels::single("a", "1,b=2")),
            MetricsEvent::counter("hits_total", 5.0, Labels::from([("a", "1"), ("b", "2")])),
        ];
        let plan = plan(&events, &cfg()).unwrap();
        let family = &plan["ns_sub_hits_total"];

        assert_eq!(family.samples.len(), 2);
        assert_eq!(family.label_values(&family.samples[0]), vec!["1,b=2", ""]);
        assert_eq!(family.label_values(&family.samples[1]), vec!["1", "2"]);
    }

    #[test]
    fn rejects_invalid_label_before_anything_else() {
        let events = vec![
            MetricsEvent::counter("ok_total", 1.0, Labels::new()),
            MetricsEvent::counter("bad_total", 1.0, Labels::single("123bad", "x")),
        ];
        assert!(matches!(
            plan(&events, &cfg()),
            Err(ExporterError::InvalidLabelName { label, .. }) if label == "123bad"
        ));
    }

    #[test]
    fn rejects_invalid_metric_name() {
        let events = vec![MetricsEvent::gauge("met-ric", 1.0, Labels::new())];
        assert!(matches!(
            plan(&events, &cfg()),
            Err(ExporterError::InvalidMetricName(n)) if n == "ns_sub_met-ric"
        ));
    }

    #[test]
    fn rejects_kind_conflicts_and_negative_counters() {
        let events = vec![
            MetricsEvent::counter("x", 1.0, Labels::new()),
            MetricsEvent::gauge("x", 1.0, Labels::single("a", "b")),
        ];
        assert!(matches!(
            plan(&events, &cfg()),
            Err(ExporterError::KindConflict { .. })
        ));

        let events = vec![MetricsEvent::counter("x", -1.0, Labels::new())];
        assert!(matches!(
            plan(&events, &cfg()),
            Err(ExporterError::InvalidValue { .. })
        ));
    }

    #[test]
    fn histogram_le_label_is_reserved() {
        let summary = HistogramSummary::from_cumulative(&[(1.0, 1)]);
        let events = vec![MetricsEvent::histogram("h", summary, Labels::single("le", "1"))];
        assert!(matches!(
            plan(&events, &cfg()),
            Err(ExporterError::InvalidLabelName { .. })
        ));
    }

    #[test]
    fn histogram_bounds_must_agree() {
        let events = vec![
            MetricsEvent::histogram(
                "h",
                HistogramSummary::from_cumulative(&[(1.0, 1)]),
                Labels::single("a", "1"),
            ),
            MetricsEvent::histogram(
                "h",
                HistogramSummary::from_cumulative(&[(2.0, 1)]),
                Labels::single("a", "2"),
            ),
        ];
        assert!(plan(&events, &cfg()).is_err());
    }

    #[test]
    fn histogram_samples_are_reconstructed() {
        let summary = HistogramSummary::from_cumulative(&[(10.0, 2), (50.0, 5), (100.0, 5)]);
        let events = vec![MetricsEvent::histogram("latency_ms", summary, Labels::new())];
        let plan = plan(&events, &cfg()).unwrap();
        let family = &plan["ns_sub_latency_ms"];

        assert_eq!(family.bounds, vec![10.0, 50.0, 100.0]);
        assert_eq!(
            family.samples[0].value,
            SampleValue::Observations(vec![
                Observation {
                    value: 5.0,
                    times: 2
                },
                Observation {
                    value: 30.0,
                    times: 3
                },
            ])
        );
    }

    #[test]
    fn help_comes_from_taxonomy() {
        let config = cfg().with_taxonomy(Arc::new(StaticTaxonomy::new()));
        let events = vec![MetricsEvent::gauge("wait_seconds", 1.0, Labels::new())];
        let plan = plan(&events, &config).unwrap();
        assert_eq!(plan["ns_sub_wait_seconds"].help, "wait_seconds (seconds)");
    }
}
