//! Pipeline metrics
//!
//! Counters, gauges, and histograms backed by atomics, exported in
//! Prometheus text format.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Counter metric (monotonically increasing)
#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
    name: String,
    help: String,
}

impl Counter {
    /// Create a new counter
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            value: AtomicU64::new(0),
            name: name.into(),
            help: help.into(),
        }
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by delta
    pub fn inc_by(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Get current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} counter\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// Gauge metric (can go up or down)
#[derive(Debug)]
pub struct Gauge {
    value: AtomicI64,
    name: String,
    help: String,
}

impl Gauge {
    /// Create a new gauge
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            value: AtomicI64::new(0),
            name: name.into(),
            help: help.into(),
        }
    }

    /// Set value
    pub fn set(&self, val: i64) {
        self.value.store(val, Ordering::Relaxed);
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement by 1
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get current value
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} gauge\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// Histogram for latency measurements
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<(f64, AtomicU64)>,
    sum_micros: AtomicU64,
    count: AtomicU64,
    name: String,
    help: String,
}

impl Histogram {
    /// Create a histogram with the given upper bounds in seconds
    pub fn new(name: &str, help: &str, bounds: &[f64]) -> Self {
        Self {
            buckets: bounds.iter().map(|&b| (b, AtomicU64::new(0))).collect(),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
            name: name.into(),
            help: help.into(),
        }
    }

    /// Default latency bounds: 100us .. 10s
    pub fn with_latency_bounds(name: &str, help: &str) -> Self {
        Self::new(
            name,
            help,
            &[0.0001, 0.001, 0.01, 0.1, 1.0, 10.0],
        )
    }

    /// Record one observation
    pub fn observe(&self, duration: Duration) {
        let secs = duration.as_secs_f64();
        for (bound, count) in &self.buckets {
            if secs <= *bound {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.sum_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of observations
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        let mut out = format!(
            "# HELP {} {}\n# TYPE {} histogram\n",
            self.name, self.help, self.name
        );
        for (bound, count) in &self.buckets {
            out.push_str(&format!(
                "{}_bucket{{le=\"{}\"}} {}\n",
                self.name,
                bound,
                count.load(Ordering::Relaxed)
            ));
        }
        out.push_str(&format!(
            "{}_bucket{{le=\"+Inf\"}} {}\n",
            self.name,
            self.count()
        ));
        out.push_str(&format!(
            "{}_sum {}\n",
            self.name,
            self.sum_micros.load(Ordering::Relaxed) as f64 / 1e6
        ));
        out.push_str(&format!("{}_count {}\n", self.name, self.count()));
        out
    }
}

/// All metrics exported by one pipeline instance
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Record files opened
    pub files_opened: Counter,
    /// Raw records read from disk
    pub records_read: Counter,
    /// Raw bytes read (payloads only)
    pub bytes_read: Counter,
    /// Records rejected by framing checksums
    pub checksum_failures: Counter,
    /// Records decoded into examples
    pub records_decoded: Counter,
    /// Records that failed decoding
    pub decode_failures: Counter,
    /// Batches handed to the prefetch buffer
    pub batches_produced: Counter,
    /// Batches currently buffered ahead of the consumer
    pub prefetch_depth: Gauge,
    /// Per-record decode plus transform latency
    pub decode_latency: Histogram,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            files_opened: Counter::new("feed_files_opened_total", "Record files opened"),
            records_read: Counter::new("feed_records_read_total", "Raw records read"),
            bytes_read: Counter::new("feed_bytes_read_total", "Raw payload bytes read"),
            checksum_failures: Counter::new(
                "feed_checksum_failures_total",
                "Records failing frame checksums",
            ),
            records_decoded: Counter::new("feed_records_decoded_total", "Records decoded"),
            decode_failures: Counter::new("feed_decode_failures_total", "Records failing decode"),
            batches_produced: Counter::new("feed_batches_produced_total", "Batches produced"),
            prefetch_depth: Gauge::new("feed_prefetch_depth", "Batches buffered ahead of consumer"),
            decode_latency: Histogram::with_latency_bounds(
                "feed_decode_latency_seconds",
                "Decode and transform latency",
            ),
        }
    }

    /// Dump every metric in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.files_opened.to_prometheus());
        out.push_str(&self.records_read.to_prometheus());
        out.push_str(&self.bytes_read.to_prometheus());
        out.push_str(&self.checksum_failures.to_prometheus());
        out.push_str(&self.records_decoded.to_prometheus());
        out.push_str(&self.decode_failures.to_prometheus());
        out.push_str(&self.batches_produced.to_prometheus());
        out.push_str(&self.prefetch_depth.to_prometheus());
        out.push_str(&self.decode_latency.to_prometheus());
        out
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let c = Counter::new("test_total", "help");
        c.inc();
        c.inc_by(4);
        assert_eq!(c.get(), 5);
        assert!(c.to_prometheus().contains("test_total 5"));
    }

    #[test]
    fn test_gauge() {
        let g = Gauge::new("depth", "help");
        g.inc();
        g.inc();
        g.dec();
        assert_eq!(g.get(), 1);
        g.set(-3);
        assert_eq!(g.get(), -3);
    }

    #[test]
    fn test_histogram_buckets() {
        let h = Histogram::new("lat", "help", &[0.01, 1.0]);
        h.observe(Duration::from_millis(5));
        h.observe(Duration::from_millis(500));
        assert_eq!(h.count(), 2);
        let text = h.to_prometheus();
        assert!(text.contains("lat_bucket{le=\"0.01\"} 1"));
        assert!(text.contains("lat_bucket{le=\"1\"} 2"));
        assert!(text.contains("lat_count 2"));
    }
}
