use prometheus::{Encoder, GaugeVec, IntGauge, Opts, Registry, TextEncoder};
use rigwatch_core::Summary;

/// Derives Prometheus gauges from a [`Summary`] rollup on each scrape (spec
/// §4.D "if metrics are enabled, export derived gauges"; spec §4.G item 3
/// "`/metrics` in Prometheus text-exposition format"). Gauges are derived
/// from the assembled `Result` rather than from arbitrary Collector-specific
/// fields, since `Collector::Output` is not self-describing for metric names
/// (see DESIGN.md).
pub struct Metrics {
    registry: Registry,
    component_abnormal: GaugeVec,
    overall_abnormal: IntGauge,
    reported_components: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let component_abnormal = GaugeVec::new(
            Opts::new("rigwatch_component_abnormal", "1 if the component's latest result is abnormal, else 0"),
            &["component"],
        )
        .expect("static metric descriptor");
        let overall_abnormal = IntGauge::new("rigwatch_node_abnormal", "1 if the node-level summary is abnormal, else 0").expect("static metric descriptor");
        let reported_components = IntGauge::new("rigwatch_reported_components", "number of components that have reported at least once").expect("static metric descriptor");

        registry.register(Box::new(component_abnormal.clone())).expect("unique metric name");
        registry.register(Box::new(overall_abnormal.clone())).expect("unique metric name");
        registry.register(Box::new(reported_components.clone())).expect("unique metric name");

        Self {
            registry,
            component_abnormal,
            overall_abnormal,
            reported_components,
        }
    }

    pub fn update_from_summary(&self, summary: &Summary) {
        for component in &summary.components {
            self.component_abnormal
                .with_label_values(&[component.component_name.as_str()])
                .set(if component.is_abnormal() { 1.0 } else { 0.0 });
        }
        self.overall_abnormal.set(i64::from(summary.overall_status == rigwatch_core::model::Status::Abnormal));
        self.reported_components.set(summary.components.len() as i64);
    }

    /// Renders the current gauge state as Prometheus text-exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        Ok(String::from_utf8(buf).expect("prometheus text encoding is always valid utf-8"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigwatch_core::model::{CheckerResult, HealthResult, Level};
    use chrono::Utc;

    #[test]
    fn render_reflects_component_abnormal_state() {
        let metrics = Metrics::new();
        let summary = Summary {
            overall_status: rigwatch_core::model::Status::Abnormal,
            overall_level: Some(Level::Warning),
            components: vec![HealthResult::assemble(
                "gpu",
                vec![CheckerResult::abnormal("temp", Level::Warning, "hot")],
                Utc::now(),
            )],
        };
        metrics.update_from_summary(&summary);
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("rigwatch_component_abnormal{component=\"gpu\"} 1"));
        assert!(rendered.contains("rigwatch_node_abnormal 1"));
    }
}
