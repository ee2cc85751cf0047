//! History seeding and incremental random-walk steps.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vattenvakt_core::model::{round_to, Reading};

use crate::signal;

/// Thirty days of hourly samples.
pub const DEFAULT_HISTORY_HOURS: usize = 30 * 24;

/// Maximum per-step change of each scalar.
pub const WATER_LEVEL_STEP: f64 = 0.1;
pub const TEMPERATURE_STEP: f64 = 0.3;
pub const CONDUCTIVITY_STEP: f64 = 8.0;

/// Produces synthetic readings for one region from an injected random source.
///
/// The walk produced by [`SeriesGenerator::step`] never re-anchors to the
/// seeded trend and seasonal model, so long runs drift freely.
#[derive(Debug, Clone)]
pub struct SeriesGenerator<R = StdRng> {
    rng: R,
    history_hours: usize,
}

impl SeriesGenerator<StdRng> {
    /// Deterministic generator: equal seeds give equal output.
    pub fn seeded(seed: u64, history_hours: usize) -> Self {
        Self::new(StdRng::seed_from_u64(seed), history_hours)
    }

    /// Generator seeded from OS entropy.
    pub fn from_os_rng(history_hours: usize) -> Self {
        Self::new(StdRng::from_os_rng(), history_hours)
    }
}

impl<R: Rng> SeriesGenerator<R> {
    pub fn new(rng: R, history_hours: usize) -> Self {
        Self { rng, history_hours }
    }

    pub fn history_hours(&self) -> usize {
        self.history_hours
    }

    /// Hourly history ending one hour before `now`.
    pub fn seed(&mut self, region_index: usize, now: DateTime<Utc>) -> Vec<Reading> {
        let len = self.history_hours;
        let base = signal::base_level(region_index);

        (0..len)
            .map(|i| {
                let noise = signal::standard_normal(&mut self.rng) * signal::NOISE_STD_DEV;
                let level = base + signal::trend(i, len) + signal::seasonal(i, len) + noise;

                let hour = i as f64;
                let temperature =
                    20.0 + 5.0 * (hour / 24.0).sin() + self.rng.random_range(-0.5..0.5);
                let conductivity =
                    900.0 + 100.0 * (hour / 48.0).cos() + self.rng.random_range(-15.0..15.0);

                Reading {
                    timestamp: now - Duration::hours((len - i) as i64),
                    water_level: round_to(level, 2),
                    temperature: round_to(temperature, 1),
                    conductivity: round_to(conductivity, 2),
                }
            })
            .collect()
    }

    /// Next reading of the walk, stamped with `timestamp`.
    pub fn step(&mut self, previous: &Reading, timestamp: DateTime<Utc>) -> Reading {
        let d_level = self.rng.random_range(-WATER_LEVEL_STEP..=WATER_LEVEL_STEP);
        let d_temp = self.rng.random_range(-TEMPERATURE_STEP..=TEMPERATURE_STEP);
        let d_cond = self.rng.random_range(-CONDUCTIVITY_STEP..=CONDUCTIVITY_STEP);

        Reading {
            timestamp,
            water_level: round_to(previous.water_level + d_level, 2),
            temperature: round_to(previous.temperature + d_temp, 1),
            conductivity: round_to(previous.conductivity + d_cond, 2),
        }
    }
}
