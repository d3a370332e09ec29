//! Observability: logging, metrics and the view event stream.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{ChannelSink, EventEmitter, NoopSink, NotificationLevel, ViewEvent, ViewSink};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
