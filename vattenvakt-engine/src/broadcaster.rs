//! ## vattenvakt-engine::broadcaster
//! **Advances every region's series and fans the new readings out**
//!
//! Fan-out rides on a bounded `tokio::sync::broadcast` channel. Each
//! subscriber has its own cursor, so a slow one only loses its own oldest
//! messages and never holds up the tick or the other subscribers.

use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, instrument, warn};

use vattenvakt_core::model::Publication;
use vattenvakt_core::time::Clock;
use vattenvakt_simulator::SeriesGenerator;
use vattenvakt_storage::RegionSeriesStore;
use vattenvakt_telemetry::MetricsRecorder;

use crate::error::EngineError;

pub struct Broadcaster {
    store: Arc<RegionSeriesStore>,
    /// One generator per region, in region order. The lock also serializes
    /// concurrent ticks.
    generators: Mutex<Vec<(String, SeriesGenerator)>>,
    sender: broadcast::Sender<Publication>,
    default_region: String,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRecorder>,
}

impl Broadcaster {
    pub fn new(
        store: Arc<RegionSeriesStore>,
        generators: Vec<(String, SeriesGenerator)>,
        default_region: impl Into<String>,
        channel_capacity: usize,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            store,
            generators: Mutex::new(generators),
            sender,
            default_region: default_region.into(),
            clock,
            metrics,
        }
    }

    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    /// Appends one reading per region and publishes each of them.
    ///
    /// A region without any reading is unrecoverable and aborts the tick.
    #[instrument(level = "debug", name = "broadcast_tick", skip(self))]
    pub fn tick(&self) -> Result<Vec<Publication>, EngineError> {
        let started = Instant::now();
        let now = self.clock.now();
        let mut generators = self.generators.lock();
        let mut published = Vec::with_capacity(generators.len());

        for (region_id, generator) in generators.iter_mut() {
            let latest = self
                .store
                .latest(region_id)?
                .ok_or_else(|| EngineError::SeriesInvariant(region_id.clone()))?;

            let timestamp = now.max(latest.timestamp + Duration::milliseconds(1));
            let next = generator.step(&latest, timestamp);
            self.store.append(region_id, next.clone())?;

            let publication = Publication::new(region_id.as_str(), next);
            // Err only means nobody is listening right now.
            let receivers = self.sender.send(publication.clone()).unwrap_or(0);
            debug!(region = %region_id, receivers, water_level = publication.reading.water_level, "published");

            self.metrics.readings_published.inc();
            published.push(publication);
        }

        self.metrics.broadcast_ticks.inc();
        self.metrics
            .tick_duration
            .with_label_values(&["broadcast"])
            .observe(started.elapsed().as_secs_f64());
        Ok(published)
    }

    /// New subscriber. Its first message is the default region's latest
    /// reading, followed by everything published from now on.
    pub fn subscribe(&self) -> Subscription {
        let receiver = self.sender.subscribe();
        let catch_up = self
            .store
            .latest(&self.default_region)
            .ok()
            .flatten()
            .map(|reading| Publication::new(self.default_region.as_str(), reading));

        self.metrics.subscribers.inc();
        Subscription {
            catch_up,
            receiver,
            metrics: self.metrics.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving end of the push channel. Dropping it unsubscribes.
pub struct Subscription {
    catch_up: Option<Publication>,
    receiver: broadcast::Receiver<Publication>,
    metrics: Arc<MetricsRecorder>,
}

impl Subscription {
    /// Next publication, or `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<Publication> {
        if let Some(publication) = self.catch_up.take() {
            return Some(publication);
        }
        loop {
            match self.receiver.recv().await {
                Ok(publication) => return Some(publication),
                Err(RecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Option<Publication> {
        if let Some(publication) = self.catch_up.take() {
            return Some(publication);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(publication) => return Some(publication),
                Err(TryRecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn lagged(&self, skipped: u64) {
        warn!(skipped, "subscriber fell behind, oldest publications dropped");
        self.metrics.publish_lagged.inc_by(skipped);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.metrics.subscribers.dec();
    }
}
