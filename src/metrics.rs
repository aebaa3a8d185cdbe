/// Gauge registry and publication: maps the extracted run facts onto
/// named pushgateway gauges carrying the reporting host's instance label.
use crate::classify::Variant;
use crate::state::RunFacts;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;

/// Errors from registry construction or publication.
#[derive(Debug)]
pub enum MetricsError {
    /// Building or registering a gauge failed.
    Registry(prometheus::Error),
    /// Encoding the text exposition format failed.
    Encode(prometheus::Error),
    /// Pushing to the pushgateway failed. Not retried.
    Push(prometheus::Error),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Registry(e) => write!(f, "failed to register gauges: {e}"),
            MetricsError::Encode(e) => write!(f, "failed to encode metrics: {e}"),
            MetricsError::Push(e) => write!(f, "failed to push metrics: {e}"),
        }
    }
}

impl std::error::Error for MetricsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetricsError::Registry(e) | MetricsError::Encode(e) | MetricsError::Push(e) => Some(e),
        }
    }
}

/// Gauges registered for the given grammar. The simple grammar reports
/// the base set; the full grammar adds the per-phase durations.
fn gauge_specs(variant: Variant) -> Vec<(&'static str, &'static str)> {
    let mut specs = vec![
        ("pyxbackup_start_time", "Timestamp pyxbackup started at"),
        ("pyxbackup_end_time", "Timestamp pyxbackup finished at"),
        ("pyxbackup_duration_seconds", "How long pyxbackup ran for"),
        (
            "pyxbackup_success",
            "Was the last run successful 0 ok 1 notok",
        ),
    ];
    if variant == Variant::Full {
        specs.extend([
            (
                "pyxbackup_duration_preparing_seconds",
                "How long pyxbackup spent preparing the backup",
            ),
            (
                "pyxbackup_duration_pruning_seconds",
                "How long pyxbackup spent pruning old backups",
            ),
            (
                "pyxbackup_duration_overall_seconds",
                "How long pyxbackup ran for including pruning",
            ),
        ]);
    }
    specs
}

/// Every fact with the gauge name it reports under. Facts whose gauge is
/// not registered for the active grammar are simply skipped.
fn fact_values(facts: &RunFacts) -> [(&'static str, f64); 7] {
    [
        ("pyxbackup_start_time", facts.start_time as f64),
        ("pyxbackup_end_time", facts.end_time as f64),
        ("pyxbackup_duration_seconds", facts.duration_seconds as f64),
        (
            "pyxbackup_duration_preparing_seconds",
            facts.duration_preparing_seconds as f64,
        ),
        (
            "pyxbackup_duration_pruning_seconds",
            facts.duration_pruning_seconds as f64,
        ),
        (
            "pyxbackup_duration_overall_seconds",
            facts.duration_overall_seconds as f64,
        ),
        ("pyxbackup_success", facts.success as f64),
    ]
}

/// An owned registry plus the map from gauge name to registered handle.
///
/// Built once at startup and handed to the emission step; nothing here
/// is process-global.
pub struct MetricSet {
    registry: Registry,
    gauges: HashMap<&'static str, GaugeVec>,
    instance: String,
}

impl MetricSet {
    /// Build and register the gauge set for the given grammar.
    pub fn new(variant: Variant, instance: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let mut gauges = HashMap::new();
        for (name, help) in gauge_specs(variant) {
            let gauge = GaugeVec::new(Opts::new(name, help), &["instance"])
                .map_err(MetricsError::Registry)?;
            registry
                .register(Box::new(gauge.clone()))
                .map_err(MetricsError::Registry)?;
            gauges.insert(name, gauge);
        }
        Ok(Self {
            registry,
            gauges,
            instance: instance.to_string(),
        })
    }

    /// Set each registered gauge from the fact set. A single best-effort
    /// write per fact, once, at end of run.
    pub fn record(&self, facts: &RunFacts) {
        for (name, value) in fact_values(facts) {
            if let Some(gauge) = self.gauges.get(name) {
                gauge
                    .with_label_values(&[self.instance.as_str()])
                    .set(value);
            }
        }
    }

    /// Render the registry in the text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(MetricsError::Encode)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Push the registry to the pushgateway under the given job name.
    pub fn push(&self, addr: &str, job: &str) -> Result<(), MetricsError> {
        prometheus::push_metrics(job, HashMap::new(), addr, self.registry.gather(), None)
            .map_err(MetricsError::Push)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> RunFacts {
        RunFacts {
            start_time: 1704164400,
            end_time: 1704165000,
            duration_seconds: 600,
            duration_preparing_seconds: 595,
            duration_pruning_seconds: 30,
            duration_overall_seconds: 630,
            success: 0,
        }
    }

    #[test]
    fn test_simple_set_renders_base_gauges() {
        let set = MetricSet::new(Variant::Simple, "db1.example.org").unwrap();
        set.record(&facts());
        let text = set.render().unwrap();
        assert!(text.contains(r#"pyxbackup_start_time{instance="db1.example.org"} 1704164400"#));
        assert!(text.contains(r#"pyxbackup_end_time{instance="db1.example.org"} 1704165000"#));
        assert!(text.contains(r#"pyxbackup_duration_seconds{instance="db1.example.org"} 600"#));
        assert!(text.contains(r#"pyxbackup_success{instance="db1.example.org"} 0"#));
    }

    #[test]
    fn test_simple_set_omits_phase_gauges() {
        let set = MetricSet::new(Variant::Simple, "db1").unwrap();
        set.record(&facts());
        let text = set.render().unwrap();
        assert!(!text.contains("pyxbackup_duration_preparing_seconds"));
        assert!(!text.contains("pyxbackup_duration_pruning_seconds"));
        assert!(!text.contains("pyxbackup_duration_overall_seconds"));
    }

    #[test]
    fn test_full_set_renders_phase_gauges() {
        let set = MetricSet::new(Variant::Full, "db1").unwrap();
        set.record(&facts());
        let text = set.render().unwrap();
        assert!(text.contains(r#"pyxbackup_duration_preparing_seconds{instance="db1"} 595"#));
        assert!(text.contains(r#"pyxbackup_duration_pruning_seconds{instance="db1"} 30"#));
        assert!(text.contains(r#"pyxbackup_duration_overall_seconds{instance="db1"} 630"#));
    }

    #[test]
    fn test_failed_run_renders_success_one() {
        let set = MetricSet::new(Variant::Simple, "db1").unwrap();
        set.record(&RunFacts {
            success: 1,
            ..facts()
        });
        let text = set.render().unwrap();
        assert!(text.contains(r#"pyxbackup_success{instance="db1"} 1"#));
    }

    #[test]
    fn test_gauges_carry_help_text() {
        let set = MetricSet::new(Variant::Simple, "db1").unwrap();
        set.record(&facts());
        let text = set.render().unwrap();
        assert!(text.contains("# HELP pyxbackup_success Was the last run successful 0 ok 1 notok"));
        assert!(text.contains("# TYPE pyxbackup_success gauge"));
    }

    #[test]
    fn test_unrecorded_set_renders_no_samples() {
        // Vector gauges materialize per label set on first write, so a
        // set that never recorded facts exposes no samples.
        let set = MetricSet::new(Variant::Simple, "db1").unwrap();
        let text = set.render().unwrap();
        assert!(!text.contains("instance="));
    }
}
