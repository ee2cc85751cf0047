//! ## vattenvakt-engine::monitor
//! **Cooldown-gated threshold alerts**
//!
//! Each tick walks the configured regions in id order. A region fires when
//! its latest water level is at or above its limit and the last firing is
//! at least one cooldown old. The firing is stamped and persisted before the
//! notifier is called, so a notifier failure never causes a repeat alert.

use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use tracing::{debug, info, instrument, warn};

use vattenvakt_core::model::AlertFired;
use vattenvakt_core::time::Clock;
use vattenvakt_storage::{RegionSeriesStore, ThresholdStore};
use vattenvakt_telemetry::MetricsRecorder;

use crate::notifier::AlertNotifier;

/// What one monitor tick decided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub fired: Vec<AlertFired>,
    /// Over the limit but still inside the cooldown.
    pub cooling_down: Vec<String>,
    /// Configured but not evaluable: no limit, no target or no reading.
    pub skipped: Vec<String>,
}

pub struct ThresholdMonitor {
    store: Arc<RegionSeriesStore>,
    thresholds: Arc<ThresholdStore>,
    notifier: Arc<dyn AlertNotifier>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    metrics: Arc<MetricsRecorder>,
}

impl ThresholdMonitor {
    pub fn new(
        store: Arc<RegionSeriesStore>,
        thresholds: Arc<ThresholdStore>,
        notifier: Arc<dyn AlertNotifier>,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            store,
            thresholds,
            notifier,
            clock,
            cooldown,
            metrics,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    #[instrument(level = "debug", name = "monitor_tick", skip(self))]
    pub async fn tick(&self) -> TickReport {
        let started = Instant::now();
        let now = self.clock.now();
        let mut report = TickReport::default();

        for (region_id, config) in self.thresholds.snapshot() {
            let Some((limit, target)) = config.armed() else {
                report.skipped.push(region_id);
                continue;
            };

            let latest = match self.store.latest(&region_id) {
                Ok(Some(latest)) => latest,
                Ok(None) => {
                    report.skipped.push(region_id);
                    continue;
                }
                Err(e) => {
                    debug!(region = %region_id, error = %e, "threshold configured for unmonitored region");
                    report.skipped.push(region_id);
                    continue;
                }
            };

            if latest.water_level < limit {
                continue;
            }
            if !config.cooldown_elapsed(now, self.cooldown) {
                debug!(region = %region_id, last = ?config.last_fired_at, "over limit, cooling down");
                report.cooling_down.push(region_id);
                continue;
            }

            let alert = AlertFired {
                region_id: region_id.clone(),
                water_level: latest.water_level,
                limit,
                notify_target: target.to_string(),
                reading_at: latest.timestamp,
                fired_at: now,
            };

            self.thresholds.record_fired(&region_id, now).await;
            self.metrics.alerts_fired.inc();
            info!(region = %region_id, water_level = alert.water_level, limit, "threshold exceeded");

            if let Err(e) = self.notifier.notify(&alert).await {
                warn!(region = %region_id, error = %e, "alert notification failed");
            }
            report.fired.push(alert);
        }

        self.metrics.monitor_ticks.inc();
        self.metrics
            .tick_duration
            .with_label_values(&["monitor"])
            .observe(started.elapsed().as_secs_f64());
        report
    }
}
