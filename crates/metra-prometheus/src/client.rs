use std::collections::HashMap;
use std::collections::hash_map::Entry;

use metra_model::MetricKind;
use prometheus::core::Collector;
use prometheus::{
    CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use tracing::{debug, trace};

use crate::convert::{Family, Plan, SampleValue};
use crate::error::ExporterError;

/// Resolves the upstream Prometheus client.
///
/// Called once, on first use; a loader that reports [`ExporterError::ClientUnavailable`] makes
/// every subsequent refresh and scrape fail with that error.
pub trait ClientLoader: Send + Sync {
    fn load(&self) -> Result<Registry, ExporterError>;
}

/// Loader backed by a fresh, private [`Registry`].
#[derive(Debug, Clone, Default)]
pub struct DefaultClientLoader;

impl ClientLoader for DefaultClientLoader {
    fn load(&self) -> Result<Registry, ExporterError> {
        Ok(Registry::new())
    }
}

/// Loader handing out an existing registry, e.g. one shared with other collectors.
impl ClientLoader for Registry {
    fn load(&self) -> Result<Registry, ExporterError> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Shape {
    label_names: Vec<String>,
    bounds: Vec<f64>,
}

impl Shape {
    fn of(family: &Family) -> Self {
        Self {
            label_names: family.label_names.clone(),
            bounds: family.bounds.clone(),
        }
    }
}

struct Registered<V> {
    vec: V,
    shape: Shape,
}

/// Upstream collectors owned by one exporter.
pub(crate) struct Upstream {
    registry: Registry,
    counters: HashMap<String, Registered<CounterVec>>,
    gauges: HashMap<String, Registered<GaugeVec>>,
    histograms: HashMap<String, Registered<HistogramVec>>,
}

impl Upstream {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            counters: HashMap::new(),
            gauges: HashMap::new(),
            histograms: HashMap::new(),
        }
    }

    pub fn collector_count(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.histograms.len()
    }

    /// Make the registered collectors mirror `plan`.
    ///
    /// Collectors whose metric vanished or changed kind are unregistered; collectors whose label
    /// set or bucket bounds changed are recreated. Every remaining collector is reset and refilled.
    ///
    /// Not transactional: a registration error midway leaves the families before it already
    /// updated. Only a plan that failed validation leaves the exposition untouched, because it
    /// never reaches this point.
    pub fn apply(&mut self, plan: &Plan) -> Result<(), ExporterError> {
        drop_stale(&self.registry, &mut self.counters, plan, MetricKind::Counter);
        drop_stale(&self.registry, &mut self.gauges, plan, MetricKind::Gauge);
        drop_stale(&self.registry, &mut self.histograms, plan, MetricKind::Histogram);

        for (name, family) in plan {
            let names: Vec<&str> = family.label_names.iter().map(String::as_str).collect();
            match family.kind {
                MetricKind::Counter => {
                    let vec = ensure(&self.registry, &mut self.counters, name, family, || {
                        CounterVec::new(Opts::new(name.as_str(), family.help.as_str()), &names)
                    })?;
                    vec.reset();
                    for sample in &family.samples {
                        let values = family.label_values(sample);
                        let counter = vec
                            .get_metric_with_label_values(values.as_slice())
                            .map_err(|e| registration(name, e))?;
                        if let SampleValue::Scalar(v) = sample.value {
                            counter.inc_by(v);
                        }
                    }
                }
                MetricKind::Gauge => {
                    let vec = ensure(&self.registry, &mut self.gauges, name, family, || {
                        GaugeVec::new(Opts::new(name.as_str(), family.help.as_str()), &names)
                    })?;
                    vec.reset();
                    for sample in &family.samples {
                        let values = family.label_values(sample);
                        let gauge = vec
                            .get_metric_with_label_values(values.as_slice())
                            .map_err(|e| registration(name, e))?;
                        if let SampleValue::Scalar(v) = sample.value {
                            gauge.set(v);
                        }
                    }
                }
                MetricKind::Histogram => {
                    let vec = ensure(&self.registry, &mut self.histograms, name, family, || {
                        HistogramVec::new(
                            HistogramOpts::new(name.as_str(), family.help.as_str())
                                .buckets(family.bounds.clone()),
                            &names,
                        )
                    })?;
                    vec.reset();
                    for sample in &family.samples {
                        let values = family.label_values(sample);
                        let histogram = vec
                            .get_metric_with_label_values(values.as_slice())
                            .map_err(|e| registration(name, e))?;
                        if let SampleValue::Observations(observations) = &sample.value {
                            for o in observations {
                                for _ in 0..o.times {
                                    histogram.observe(o.value);
                                }
                            }
                        }
                    }
                }
            }
        }
        trace!(collectors = self.collector_count(), "upstream collectors updated");
        Ok(())
    }

    pub fn encode(&self) -> Result<String, ExporterError> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(ExporterError::Encode)
    }
}

fn registration(metric: &str, source: prometheus::Error) -> ExporterError {
    ExporterError::Registration {
        metric: metric.to_string(),
        source,
    }
}

fn drop_stale<V>(
    registry: &Registry,
    map: &mut HashMap<String, Registered<V>>,
    plan: &Plan,
    kind: MetricKind,
) where
    V: Collector + Clone + 'static,
{
    map.retain(|name, entry| {
        let keep = plan.get(name).is_some_and(|f| f.kind == kind);
        if !keep {
            debug!(metric = %name, "unregistering stale collector");
            unregister(registry, name, &entry.vec);
        }
        keep
    });
}

fn unregister<V>(registry: &Registry, name: &str, vec: &V)
where
    V: Collector + Clone + 'static,
{
    if let Err(e) = registry.unregister(Box::new(vec.clone())) {
        debug!(metric = %name, error = %e, "collector was not registered");
    }
}

fn ensure<'m, V, F>(
    registry: &Registry,
    map: &'m mut HashMap<String, Registered<V>>,
    name: &str,
    family: &Family,
    build: F,
) -> Result<&'m V, ExporterError>
where
    V: Collector + Clone + 'static,
    F: FnOnce() -> prometheus::Result<V>,
{
    let shape = Shape::of(family);
    if let Some(entry) = map.get(name)
        && entry.shape != shape
    {
        debug!(metric = %name, "label set or buckets changed; recreating collector");
        unregister(registry, name, &entry.vec);
        map.remove(name);
    }

    match map.entry(name.to_string()) {
        Entry::Occupied(entry) => Ok(&entry.into_mut().vec),
        Entry::Vacant(slot) => {
            let vec = build().map_err(|e| registration(name, e))?;
            registry
                .register(Box::new(vec.clone()))
                .map_err(|e| registration(name, e))?;
            debug!(metric = %name, kind = %family.kind, "registered collector");
            Ok(&slot.insert(Registered { vec, shape }).vec)
        }
    }
}

#[cfg(test)]
mod tests {
    use metra_model::{HistogramSummary, Labels, MetricsEvent};

    use super::*;
    use crate::config::ExporterConfig;
    use crate::convert::plan;

    fn cfg() -> ExporterConfig {
        ExporterConfig::default()
            .with_namespace("t")
            .with_subsystem("")
    }

    fn apply(up: &mut Upstream, events: &[MetricsEvent]) -> String {
        up.apply(&plan(events, &cfg()).unwrap()).unwrap();
        up.encode().unwrap()
    }

    #[test]
    fn mirrors_scalar_series() {
        let mut up = Upstream::new(Registry::new());
        let text = apply(
            &mut up,
            &[
                MetricsEvent::counter("jobs_total", 3.0, Labels::single("queue", "a")),
                MetricsEvent::gauge("depth", 7.0, Labels::new()),
            ],
        );
        assert!(text.contains("# TYPE t_jobs_total counter"));
        assert!(text.contains("t_jobs_total{queue=\"a\"} 3"));
        assert!(text.contains("t_depth 7"));
        assert_eq!(up.collector_count(), 2);

        let text = apply(
            &mut up,
            &[MetricsEvent::counter("jobs_total", 1.0, Labels::single("queue", "b"))],
        );
        assert!(!text.contains("queue=\"a\""));
        assert!(text.contains("t_jobs_total{queue=\"b\"} 1"));
        assert!(!text.contains("t_depth"));
        assert_eq!(up.collector_count(), 1);
    }

    #[test]
    fn recreates_collector_when_labels_change() {
        let mut up = Upstream::new(Registry::new());
        apply(&mut up, &[MetricsEvent::gauge("g", 1.0, Labels::new())]);
        let text = apply(
            &mut up,
            &[
                MetricsEvent::gauge("g", 1.0, Labels::new()),
                MetricsEvent::gauge("g", 2.0, Labels::single("zone", "eu")),
            ],
        );
        assert!(text.contains("t_g{zone=\"\"} 1"));
        assert!(text.contains("t_g{zone=\"eu\"} 2"));
    }

    #[test]
    fn externally_unregistered_collector_is_still_dropped() {
        let registry = Registry::new();
        let mut up = Upstream::new(registry.clone());
        apply(&mut up, &[MetricsEvent::gauge("gone", 1.0, Labels::new())]);

        let vec = up.gauges["t_gone"].vec.clone();
        registry.unregister(Box::new(vec)).unwrap();

        let text = apply(&mut up, &[MetricsEvent::gauge("kept", 2.0, Labels::new())]);
        assert!(text.contains("t_kept 2"));
        assert!(!text.contains("t_gone"));
        assert_eq!(up.collector_count(), 1);
    }

    #[test]
    fn kind_change_swaps_collector() {
        let mut up = Upstream::new(Registry::new());
        apply(&mut up, &[MetricsEvent::gauge("x", 1.0, Labels::new())]);
        let text = apply(&mut up, &[MetricsEvent::counter("x", 4.0, Labels::new())]);
        assert!(text.contains("# TYPE t_x counter"));
    }

    #[test]
    fn histogram_bucket_counts_survive() {
        let mut up = Upstream::new(Registry::new());
        let summary = HistogramSummary::from_cumulative(&[(10.0, 2), (50.0, 5), (100.0, 5)]);
        let text = apply(
            &mut up,
            &[MetricsEvent::histogram("latency_ms", summary, Labels::new())],
        );
        assert!(text.contains("t_latency_ms_bucket{le=\"10\"} 2"));
        assert!(text.contains("t_latency_ms_bucket{le=\"50\"} 5"));
        assert!(text.contains("t_latency_ms_bucket{le=\"100\"} 5"));
        assert!(text.contains("t_latency_ms_count 5"));
        assert!(text.contains("t_latency_ms_sum 100"));
    }

    #[test]
    fn shared_registry_loader_returns_same_registry() {
        let registry = Registry::new();
        let loaded = ClientLoader::load(&registry).unwrap();
        let c = prometheus::IntCounter::new("shared_total", "h").unwrap();
        loaded.register(Box::new(c)).unwrap();
        assert_eq!(registry.gather().len(), 1);
    }
}
