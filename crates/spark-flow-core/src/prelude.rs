//! 常用类型的一站式重导出。
pub use crate::error::{ErrorCategory, Result, SparkError};
pub use crate::observability::{LogField, LogRecord, LogSeverity, Logger};
pub use crate::reactive::demand::DemandCounter;
pub use crate::reactive::fusion::QueueSubscription;
pub use crate::reactive::introspection::{
    walk, DemandValue, EdgeType, GraphEdge, GraphNode, GraphSnapshot, GraphStats, HasDownstream,
    HasDownstreams, HasLoopback, HasUpstream, HasUpstreams, Introspectable, NodeHandle, NodeId,
};
pub use crate::reactive::iterator_source::{from_values, IteratorPublisher};
pub use crate::reactive::publisher::Publisher;
pub use crate::reactive::subscriber::Subscriber;
pub use crate::reactive::subscription::Subscription;
pub use crate::reactive::timer_interval::TimerIntervalPublisher;
pub use crate::reactive::timer_single::TimerSinglePublisher;
pub use crate::reactive::with_latest_from::WithLatestFromPublisher;
pub use crate::time::{ManualTimerDriver, TimerDriver, TimerTaskHandle};
#[cfg(feature = "std")]
pub use crate::time::SystemTimerDriver;
