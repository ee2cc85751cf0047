// vattenvakt-simulator/src/lib.rs

/*!
# Vattenvakt Simulator

Synthetic groundwater telemetry. The simulator produces a month of hourly
history per region and then advances each series one reading at a time
with a bounded random walk.

## Key Components:
- **Signal model:** trend, seasonal and noise terms of the seeded history.
- **Series generator:** history seeding and incremental steps over an
  injected random source, so equal seeds reproduce equal series.
*/

pub mod generator;
pub mod signal;

pub use generator::{SeriesGenerator, DEFAULT_HISTORY_HOURS};
