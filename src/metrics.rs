// Resolution metrics module
//
// Counters for what the engine did during a session, logged on shutdown

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for one [`ConfigEngine`](crate::engine::ConfigEngine), readable
/// through a shared reference.
#[derive(Debug)]
pub struct ResolutionMetrics {
    /// Documents overlaid onto the working document
    pub merges: AtomicU64,

    /// Full product re-projections
    pub projections: AtomicU64,

    /// Product reads served from the memoized list
    pub cache_hits: AtomicU64,

    /// Config writes accepted
    pub config_writes: AtomicU64,

    /// Config writes refused because the key is protected
    pub rejected_writes: AtomicU64,

    /// Completed locale resolutions
    pub locale_resolutions: AtomicU64,

    /// Time spent projecting products, in milliseconds
    pub projection_time_ms: AtomicU64,

    start_time: Instant,
}

impl ResolutionMetrics {
    pub fn new() -> Self {
        Self {
            merges: AtomicU64::new(0),
            projections: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            config_writes: AtomicU64::new(0),
            rejected_writes: AtomicU64::new(0),
            locale_resolutions: AtomicU64::new(0),
            projection_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_merge(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a full projection pass and its duration
    pub fn record_projection(&self, duration: Duration) {
        self.projections.fetch_add(1, Ordering::Relaxed);
        self.projection_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_config_write(&self) {
        self.config_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_write(&self) {
        self.rejected_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_locale_resolution(&self) {
        self.locale_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average projection pass time in milliseconds
    pub fn avg_projection_time_ms(&self) -> f64 {
        let total = self.projection_time_ms.load(Ordering::Relaxed);
        let count = self.projections.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Resolution Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Merges: {}, locale resolutions: {}",
            self.merges.load(Ordering::Relaxed),
            self.locale_resolutions.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Projections: {} (avg: {:.2}ms), cache hits: {}",
            self.projections.load(Ordering::Relaxed),
            self.avg_projection_time_ms(),
            self.cache_hits.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Config writes: {} accepted, {} rejected",
            self.config_writes.load(Ordering::Relaxed),
            self.rejected_writes.load(Ordering::Relaxed)
        );
    }
}

impl Default for ResolutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = ResolutionMetrics::new();
        assert_eq!(metrics.merges.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.projections.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_counters() {
        let metrics = ResolutionMetrics::new();

        metrics.record_merge();
        metrics.record_merge();
        metrics.record_cache_hit();
        metrics.record_config_write();
        metrics.record_rejected_write();
        metrics.record_locale_resolution();

        assert_eq!(metrics.merges.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.cache_hits.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.config_writes.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rejected_writes.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.locale_resolutions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_projection_time_average() {
        let metrics = ResolutionMetrics::new();
        assert_eq!(metrics.avg_projection_time_ms(), 0.0);

        metrics.record_projection(Duration::from_millis(10));
        metrics.record_projection(Duration::from_millis(30));

        assert_eq!(metrics.projections.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.avg_projection_time_ms(), 20.0);
    }

    #[test]
    fn test_uptime() {
        let metrics = ResolutionMetrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
