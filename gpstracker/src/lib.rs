//! gpstracker - location tracking core
//!
//! Turns a stream of raw position fixes from a positioning source into a
//! filtered stream of tracking events, under an explicit lifecycle.
//!
//! ```text
//! FixSource ──raw fixes──► Tracker actor ──► FixFilter ──► SubscriptionRegistry
//!                               │                               │
//!                          state machine                  EventChannel adapters
//! ```
//!
//! # High-Level API
//!
//! ```ignore
//! use gpstracker::{QueueChannel, ReplaySource, Tracker, TrackerSettings, TrackingConfig};
//!
//! let source = ReplaySource::from_json(&track)?;
//! let tracker = Tracker::spawn(Arc::new(source), TrackerSettings::default())?;
//!
//! let (channel, mut events) = QueueChannel::new();
//! tracker.subscribe(channel);
//! tracker.start(TrackingConfig::default().with_min_distance(10.0))?.await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod fix;
pub mod geo;
pub mod history;
pub mod logging;
pub mod registry;
pub mod source;
pub mod state;
pub mod tracker;

/// Version of the gpstracker library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use channel::{EventChannel, HostEmitter, HostSink, QueueChannel};
pub use config::{
    AccuracyPreset, ConfigError, ConfigFile, ConfigFileError, TrackerSettings, TrackingConfig,
};
pub use error::TrackerError;
pub use event::{ErrorKind, TrackingEvent};
pub use filter::{FixFilter, Verdict};
pub use fix::{FixTimestamp, LocationFix};
pub use history::FixHistory;
pub use registry::{Subscription, SubscriptionId, SubscriptionRegistry};
pub use source::{
    AuthorizationStatus, FixSink, FixSource, FixSourceError, ReplaySource, ScriptedHandle,
    ScriptedSource, SourceLease,
};
pub use state::TrackerState;
pub use tracker::{Completion, MetricsSnapshot, Tracker, TrackerStatus};
