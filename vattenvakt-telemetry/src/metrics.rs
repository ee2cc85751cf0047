//! ## vattenvakt-telemetry::metrics
//! **Prometheus registry for the broadcast and alerting loops**

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub readings_published: IntCounter,
    pub broadcast_ticks: IntCounter,
    pub monitor_ticks: IntCounter,
    pub alerts_fired: IntCounter,
    pub persist_failures: IntCounter,
    pub publish_lagged: IntCounter,
    pub subscribers: IntGauge,
    /// Labelled by `task`: `broadcast` or `monitor`.
    pub tick_duration: HistogramVec,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let readings_published = IntCounter::new(
            "vattenvakt_readings_published_total",
            "Readings appended and published by the broadcaster",
        )?;
        let broadcast_ticks =
            IntCounter::new("vattenvakt_broadcast_ticks_total", "Completed broadcaster ticks")?;
        let monitor_ticks =
            IntCounter::new("vattenvakt_monitor_ticks_total", "Completed threshold monitor ticks")?;
        let alerts_fired =
            IntCounter::new("vattenvakt_alerts_fired_total", "Threshold alerts fired")?;
        let persist_failures = IntCounter::new(
            "vattenvakt_persist_failures_total",
            "Failed writes of the threshold configuration",
        )?;
        let publish_lagged = IntCounter::new(
            "vattenvakt_publish_lagged_total",
            "Publications dropped for subscribers that fell behind",
        )?;
        let subscribers =
            IntGauge::new("vattenvakt_subscribers", "Currently attached push subscribers")?;
        let tick_duration = HistogramVec::new(
            HistogramOpts::new("vattenvakt_tick_duration_seconds", "Wall time spent per tick")
                .buckets(vec![0.0001, 0.001, 0.01, 0.1, 1.0]),
            &["task"],
        )?;

        registry.register(Box::new(readings_published.clone()))?;
        registry.register(Box::new(broadcast_ticks.clone()))?;
        registry.register(Box::new(monitor_ticks.clone()))?;
        registry.register(Box::new(alerts_fired.clone()))?;
        registry.register(Box::new(persist_failures.clone()))?;
        registry.register(Box::new(publish_lagged.clone()))?;
        registry.register(Box::new(subscribers.clone()))?;
        registry.register(Box::new(tick_duration.clone()))?;

        Ok(Self {
            registry,
            readings_published,
            broadcast_ticks,
            monitor_ticks,
            alerts_fired,
            persist_failures,
            publish_lagged,
            subscribers,
            tick_duration,
        })
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registries_are_independent() {
        let a = MetricsRecorder::new().unwrap();
        let b = MetricsRecorder::new().unwrap();
        a.alerts_fired.inc();
        assert_eq!(a.alerts_fired.get(), 1);
        assert_eq!(b.alerts_fired.get(), 0);
    }

    #[test]
    fn exposition_contains_every_family() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.readings_published.inc_by(4);
        metrics.subscribers.set(2);
        metrics
            .tick_duration
            .with_label_values(&["broadcast"])
            .observe(0.002);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("vattenvakt_readings_published_total 4"));
        assert!(text.contains("vattenvakt_subscribers 2"));
        assert!(text.contains(r#"vattenvakt_tick_duration_seconds_count{task="broadcast"} 1"#));
        assert!(!text.contains(r#"task="monitor""#));
        assert!(text.contains("vattenvakt_persist_failures_total 0"));
    }
}
