use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Running totals for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickCounters {
    pub frames_processed: usize,
    pub frames_missed: usize,
    pub control_ticks: usize,
    pub actuations_withheld: usize,
    pub safety_rejections: usize,
    pub driver_faults: usize,
}

pub struct MetricsRecorder {
    inner: Mutex<TickCounters>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TickCounters::default()),
        }
    }

    fn bump(&self, field: impl FnOnce(&mut TickCounters)) {
        if let Ok(mut counters) = self.inner.lock() {
            field(&mut counters);
        }
    }

    pub fn record_frame(&self) {
        self.bump(|c| c.frames_processed += 1);
    }

    pub fn record_missed_frame(&self) {
        self.bump(|c| c.frames_missed += 1);
    }

    pub fn record_control_tick(&self) {
        self.bump(|c| c.control_ticks += 1);
    }

    pub fn record_withheld(&self) {
        self.bump(|c| c.actuations_withheld += 1);
    }

    pub fn record_safety_rejection(&self) {
        self.bump(|c| c.safety_rejections += 1);
    }

    pub fn record_driver_fault(&self) {
        self.bump(|c| c.driver_faults += 1);
    }

    pub fn snapshot(&self) -> TickCounters {
        self.inner.lock().map(|c| *c).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
