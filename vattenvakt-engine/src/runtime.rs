/*!
# Runtime

Process-lifetime context of the engine. [`Runtime::build`] wires the
series store, the threshold store, the broadcaster and the monitor
without spawning anything, so tests and the offline simulator can drive
ticks by hand against a virtual clock. [`Runtime::start`] (or
[`Runtime::spawn`] on a built runtime) moves both periodic loops onto
tokio tasks and hands back a [`RuntimeHandle`] to stop and join them.
*/

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, instrument, Instrument};

use vattenvakt_config::{ConfigError, VattenvaktConfig};
use vattenvakt_core::time::Clock;
use vattenvakt_simulator::SeriesGenerator;
use vattenvakt_storage::{RegionSeriesStore, ThresholdPersistence, ThresholdStore};
use vattenvakt_telemetry::{MetricsRecorder, TelemetryError};

use crate::broadcaster::Broadcaster;
use crate::error::EngineError;
use crate::monitor::ThresholdMonitor;
use crate::notifier::AlertNotifier;
use crate::service::MonitoringService;

pub struct Runtime {
    config: Arc<VattenvaktConfig>,
    metrics: Arc<MetricsRecorder>,
    store: Arc<RegionSeriesStore>,
    thresholds: Arc<ThresholdStore>,
    broadcaster: Arc<Broadcaster>,
    monitor: Arc<ThresholdMonitor>,
    service: MonitoringService,
}

impl Runtime {
    /// Builds, seeds and spawns in one go.
    pub async fn start(
        config: VattenvaktConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn AlertNotifier>,
        persistence: Arc<dyn ThresholdPersistence>,
    ) -> Result<RuntimeHandle, EngineError> {
        Ok(Self::build(config, clock, notifier, persistence)
            .await?
            .spawn())
    }

    /// Seeds every region's history and loads the persisted thresholds.
    #[instrument(level = "info", name = "runtime_build", skip_all)]
    pub async fn build(
        config: VattenvaktConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn AlertNotifier>,
        persistence: Arc<dyn ThresholdPersistence>,
    ) -> Result<Self, EngineError> {
        config.validate_all()?;
        let metrics = Arc::new(MetricsRecorder::new().map_err(TelemetryError::from)?);

        let regions = Arc::new(config.simulation.region_models());
        let store = Arc::new(RegionSeriesStore::new(
            regions.iter().map(|r| r.id.clone()),
            config.retention.max_readings,
        ));

        let now = clock.now();
        let history_hours = config.simulation.history_hours;
        let mut generators = Vec::with_capacity(regions.len());
        for (idx, region) in regions.iter().enumerate() {
            let mut generator = match config.simulation.seed {
                Some(seed) => SeriesGenerator::seeded(seed.wrapping_add(idx as u64), history_hours),
                None => SeriesGenerator::from_os_rng(history_hours),
            };
            store.seed(&region.id, generator.seed(idx, now))?;
            generators.push((region.id.clone(), generator));
        }
        info!(
            regions = regions.len(),
            history_hours,
            seed = ?config.simulation.seed,
            "series seeded"
        );

        let thresholds = Arc::new(ThresholdStore::load(persistence).await.with_metrics(metrics.clone()));

        let default_region = config
            .default_region()
            .map(str::to_string)
            .unwrap_or_default();
        let broadcaster = Arc::new(Broadcaster::new(
            store.clone(),
            generators,
            default_region,
            config.broadcast.channel_capacity,
            clock.clone(),
            metrics.clone(),
        ));

        let cooldown = chrono::Duration::from_std(config.monitor.cooldown())
            .map_err(|e| ConfigError::Inconsistent(format!("monitor.cooldown_secs: {e}")))?;
        let monitor = Arc::new(ThresholdMonitor::new(
            store.clone(),
            thresholds.clone(),
            notifier,
            clock,
            cooldown,
            metrics.clone(),
        ));

        let service = MonitoringService::new(
            regions,
            store.clone(),
            thresholds.clone(),
            broadcaster.clone(),
            config.retention.default_limit,
            config.retention.max_limit,
        );

        Ok(Self {
            config: Arc::new(config),
            metrics,
            store,
            thresholds,
            broadcaster,
            monitor,
            service,
        })
    }

    pub fn config(&self) -> &VattenvaktConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<RegionSeriesStore> {
        &self.store
    }

    pub fn thresholds(&self) -> &Arc<ThresholdStore> {
        &self.thresholds
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn monitor(&self) -> &Arc<ThresholdMonitor> {
        &self.monitor
    }

    pub fn service(&self) -> MonitoringService {
        self.service.clone()
    }

    /// Spawns the broadcaster and monitor loops. The first tick of each
    /// happens one full period after this call.
    pub fn spawn(self) -> RuntimeHandle {
        let stop = Arc::new(watch::channel(false).0);

        let broadcast_task = tokio::spawn(
            broadcast_loop(self.broadcaster.clone(), self.config.broadcast.interval(), stop.clone())
                .instrument(info_span!("broadcaster")),
        );
        let monitor_task = tokio::spawn(
            monitor_loop(self.monitor.clone(), self.config.monitor.interval(), stop.subscribe())
                .instrument(info_span!("threshold_monitor")),
        );
        info!(
            broadcast_secs = self.config.broadcast.interval_secs,
            monitor_secs = self.config.monitor.interval_secs,
            "runtime started"
        );

        RuntimeHandle {
            service: self.service,
            metrics: self.metrics,
            stop,
            tasks: vec![broadcast_task, monitor_task],
        }
    }
}

/// Control surface of a spawned runtime.
pub struct RuntimeHandle {
    service: MonitoringService,
    metrics: Arc<MetricsRecorder>,
    /// Shared with the broadcaster loop, which raises it on a fatal error.
    stop: Arc<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<Result<(), EngineError>>>,
}

impl RuntimeHandle {
    pub fn service(&self) -> &MonitoringService {
        &self.service
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Halts future ticks. A tick already running completes.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Resolves once the runtime has been told to stop, either through
    /// [`RuntimeHandle::stop`] or because a loop hit a fatal error.
    pub async fn halted(&self) {
        let mut stopped = self.stop.subscribe();
        while !*stopped.borrow_and_update() {
            if stopped.changed().await.is_err() {
                break;
            }
        }
    }

    /// Waits for both loops and returns the first failure.
    pub async fn join(self) -> Result<(), EngineError> {
        let mut outcome = Ok(());
        for task in self.tasks {
            let result = task.await.map_err(EngineError::from).and_then(|r| r);
            if let Err(e) = result {
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }
        outcome
    }

    pub async fn shutdown(self) -> Result<(), EngineError> {
        self.stop();
        self.join().await
    }
}

#[instrument(level = "debug", skip_all)]
async fn broadcast_loop(
    broadcaster: Arc<Broadcaster>,
    period: Duration,
    halt: Arc<watch::Sender<bool>>,
) -> Result<(), EngineError> {
    let mut stop = halt.subscribe();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                if let Err(e) = broadcaster.tick() {
                    error!(error = %e, "broadcaster stopped on fatal error, halting runtime");
                    halt.send_replace(true);
                    return Err(e);
                }
            }
        }
    }
    debug!("broadcaster loop exited");
    Ok(())
}

#[instrument(level = "debug", skip_all)]
async fn monitor_loop(
    monitor: Arc<ThresholdMonitor>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> Result<(), EngineError> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                let report = monitor.tick().await;
                if !report.fired.is_empty() {
                    debug!(fired = report.fired.len(), "monitor tick raised alerts");
                }
            }
        }
    }
    debug!("monitor loop exited");
    Ok(())
}
