//! Process metrics for the periodic backend report
//!
//! `MetricsCollector` owns the rolling message counter and its reset timer,
//! so the process entry injects one instance instead of keeping a global.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Memory figures of the current process, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Resident set size
    pub rss: u64,
    /// Virtual memory size
    pub virtual_memory: u64,
}

impl MemoryUsage {
    /// Sample the current process. Returns zeros when the platform hides it.
    #[must_use]
    pub fn current() -> Self {
        use sysinfo::{ProcessesToUpdate, System};

        let Ok(pid) = sysinfo::get_current_pid() else {
            return Self::default();
        };
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|p| Self {
                rss: p.memory(),
                virtual_memory: p.virtual_memory(),
            })
            .unwrap_or_default()
    }
}

/// Snapshot sent to the backend every report interval
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    /// Sessions currently managed
    pub total_sessions: usize,
    /// Sessions in the connected state
    pub connected_sessions: usize,
    /// Process memory
    pub memory_usage: MemoryUsage,
    /// Process uptime in seconds
    pub uptime: u64,
    /// Messages processed since the last hourly reset
    pub message_count_last_hour: u64,
}

/// Message counter with an hourly reset
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    messages: Arc<AtomicU64>,
    started_at: Instant,
}

impl MetricsCollector {
    /// Create a collector; uptime is measured from this call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    /// Count one processed message
    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages counted since the last reset
    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// Zero the counter, returning the value it held
    pub fn reset(&self) -> u64 {
        self.messages.swap(0, Ordering::Relaxed)
    }

    /// Time since the collector was created
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Build a report for the given session counts
    #[must_use]
    pub fn report(&self, total_sessions: usize, connected_sessions: usize) -> MetricsReport {
        MetricsReport {
            total_sessions,
            connected_sessions,
            memory_usage: MemoryUsage::current(),
            uptime: self.uptime().as_secs(),
            message_count_last_hour: self.message_count(),
        }
    }

    /// Spawn the task that resets the counter every `interval` until cancelled.
    pub fn spawn_reset_task(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let collector = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let previous = collector.reset();
                        debug!(previous, "Hourly message counter reset");
                    }
                    _ = cancel.cancelled() => {
                        info!("Metrics reset task shutting down");
                        break;
                    }
                }
            }
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_and_reset() {
        let collector = MetricsCollector::new();
        collector.record_message();
        collector.record_message();
        assert_eq!(collector.message_count(), 2);
        assert_eq!(collector.reset(), 2);
        assert_eq!(collector.message_count(), 0);
    }

    #[test]
    fn test_report_shape() {
        let collector = MetricsCollector::new();
        collector.record_message();
        let report = collector.report(3, 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalSessions"], 3);
        assert_eq!(json["connectedSessions"], 2);
        assert_eq!(json["messageCountLastHour"], 1);
        assert!(json["memoryUsage"].get("rss").is_some());
        assert!(json.get("uptime").is_some());
    }

    #[tokio::test]
    async fn test_reset_task_clears_counter() {
        let collector = MetricsCollector::new();
        let cancel = CancellationToken::new();
        let handle = collector.spawn_reset_task(Duration::from_millis(20), cancel.clone());

        collector.record_message();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(collector.message_count(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
