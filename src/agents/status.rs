//! Per-agent execution status counters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Snapshot of an agent's running counters.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AgentStatus {
    pub ready: bool,
    pub executing: bool,
    pub success_count: u64,
    pub error_count: u64,
    pub average_execution_ms: f64,
    pub last_execution: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    executing: bool,
    success_count: u64,
    error_count: u64,
    average_execution_ms: f64,
    last_execution: Option<DateTime<Utc>>,
}

/// Shared, cloneable counter cell. Locked only for short reads/updates,
/// never across an await.
#[derive(Debug, Clone, Default)]
pub struct StatusCell {
    inner: Arc<Mutex<Inner>>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AgentStatus {
        let inner = self.inner.lock().expect("status cell poisoned");
        AgentStatus {
            ready: !inner.executing,
            executing: inner.executing,
            success_count: inner.success_count,
            error_count: inner.error_count,
            average_execution_ms: inner.average_execution_ms,
            last_execution: inner.last_execution,
        }
    }

    /// Mark the agent busy for the duration of one execution.
    ///
    /// The returned guard clears the busy flag when dropped, so every exit
    /// path (including panics unwinding through the caller) releases it.
    pub fn begin(&self) -> ExecutionGuard {
        self.inner.lock().expect("status cell poisoned").executing = true;
        ExecutionGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Record a finished execution and fold its duration into the rolling
    /// average: `(old * (n - 1) + new) / n`.
    pub fn record(&self, duration_ms: u64, success: bool) {
        let mut inner = self.inner.lock().expect("status cell poisoned");
        if success {
            inner.success_count += 1;
        } else {
            inner.error_count += 1;
        }
        let n = (inner.success_count + inner.error_count) as f64;
        inner.average_execution_ms =
            (inner.average_execution_ms * (n - 1.0) + duration_ms as f64) / n;
        inner.last_execution = Some(Utc::now());
    }
}

/// Clears the busy flag on drop.
pub struct ExecutionGuard {
    inner: Arc<Mutex<Inner>>,
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.executing = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average() {
        let cell = StatusCell::new();
        cell.record(100, true);
        cell.record(200, true);
        cell.record(600, false);
        let status = cell.snapshot();
        assert_eq!(status.success_count, 2);
        assert_eq!(status.error_count, 1);
        assert!((status.average_execution_ms - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_guard_clears_busy_flag() {
        let cell = StatusCell::new();
        {
            let _guard = cell.begin();
            assert!(cell.snapshot().executing);
            assert!(!cell.snapshot().ready);
        }
        assert!(!cell.snapshot().executing);
        assert!(cell.snapshot().ready);
    }

    #[test]
    fn test_guard_clears_on_panic() {
        let cell = StatusCell::new();
        let inner_cell = cell.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner_cell.begin();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!cell.snapshot().executing);
    }
}
