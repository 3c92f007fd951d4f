use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Live progress counters shared between the reader and the orchestrator.
#[derive(Clone)]
pub struct CountMetrics {
    bytes_read: Arc<AtomicU64>,
    records: Arc<AtomicU64>,
    batches: Arc<AtomicU64>,
    oversized: Arc<AtomicU64>,
    start_time: Arc<Instant>,
}

impl CountMetrics {
    pub fn new() -> Self {
        CountMetrics {
            bytes_read: Arc::new(AtomicU64::new(0)),
            records: Arc::new(AtomicU64::new(0)),
            batches: Arc::new(AtomicU64::new(0)),
            oversized: Arc::new(AtomicU64::new(0)),
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes_read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_batch(&self, records: u64) {
        self.records.fetch_add(records, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_oversized(&self) {
        self.oversized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_bytes(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn get_records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn get_batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn get_oversized(&self) -> u64 {
        self.oversized.load(Ordering::Relaxed)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn get_record_rate(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            self.get_records() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_throughput_mb(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            self.get_bytes() as f64 / 1024.0 / 1024.0 / elapsed
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        tracing::info!("=== Read Metrics Summary ===");
        tracing::info!("  Bytes read: {}", self.get_bytes());
        tracing::info!("  Records: {}", self.get_records());
        tracing::info!("  Batches: {}", self.get_batches());
        tracing::info!("  Oversized records: {}", self.get_oversized());
        tracing::info!("  Record rate: {:.2} records/sec", self.get_record_rate());
        tracing::info!("  Throughput: {:.2} MB/sec", self.get_throughput_mb());
        tracing::info!("  Elapsed time: {:.2}s", self.elapsed_secs());
    }
}

impl Default for CountMetrics {
    fn default() -> Self {
        Self::new()
    }
}
