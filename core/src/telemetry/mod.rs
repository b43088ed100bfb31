pub mod log;
pub mod metrics;

pub use self::log::{AuditLog, AuditRecord, Severity};
pub use metrics::{MetricsRecorder, TickCounters};
