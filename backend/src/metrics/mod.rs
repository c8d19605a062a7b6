pub mod counters;
pub mod exporter;
pub mod snapshot;

pub use counters::{CounterValues, Counters};
pub use exporter::{CONTENT_TYPE, METRICS_PATH, MetricsExporter};
pub use snapshot::{MetricsSnapshot, SnapshotStore};
