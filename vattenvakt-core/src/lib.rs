//! # vattenvakt-core
//!
//! Shared domain layer for the groundwater telemetry engine.
//!
//! ### Key Submodules:
//! - `model`: regions, readings, threshold configuration and the events
//!   that flow out of the engine
//! - `regions`: the reference region registry and distance helpers
//! - `time`: `Clock` abstraction with a system clock and a virtual clock
//!   for deterministic tests and simulations

pub mod error;
pub mod model;
pub mod regions;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::model::*;
    pub use crate::regions::*;
    pub use crate::time::*;
}

pub use error::CoreError;
pub use model::{AlertFired, Publication, Reading, Region, ThresholdConfig};
pub use time::{Clock, SystemClock, VirtualClock};
