//! # vattenvakt-engine
//!
//! The moving parts: the broadcaster that advances and publishes every
//! region's series, the threshold monitor that raises alerts, the runtime
//! that owns both loops, and the service facade an outer transport calls.

pub mod broadcaster;
pub mod error;
pub mod monitor;
pub mod notifier;
pub mod runtime;
pub mod service;

pub use broadcaster::{Broadcaster, Subscription};
pub use error::{EngineError, NotifyError, ServiceError};
pub use monitor::{ThresholdMonitor, TickReport};
pub use notifier::{AlertNotifier, ChannelNotifier, LoggingNotifier};
pub use runtime::{Runtime, RuntimeHandle};
pub use service::MonitoringService;
