//! One counting run: a single reader feeding N counter workers through a
//! bounded queue. The count is only read after every worker is joined.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::{CountError, Result};
use crate::metrics::CountMetrics;
use crate::service::{batch_queue, LineReader, PresenceCounter};

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountSummary {
    /// Distinct valid IPv4 addresses
    pub distinct: u64,
    /// Records that were not dotted-quad addresses
    pub malformed: u64,
    /// Records longer than any address, dropped by the reader
    pub oversized: u64,
    pub records: u64,
    pub batches: u64,
    pub bytes: u64,
    pub memory_bytes: usize,
    pub elapsed_secs: f64,
}

pub async fn count_distinct<R>(stream: R, config: &PipelineConfig) -> Result<CountSummary>
where
    R: AsyncRead + Unpin,
{
    config.validate()?;

    let counter = Arc::new(PresenceCounter::new(config.malformed));
    let (mut tx, rx) = batch_queue(config.queue_capacity);

    let mut join_set = JoinSet::new();
    for worker_id in 0..config.workers {
        join_set.spawn(counter.clone().run_worker(worker_id, rx.clone()));
    }
    drop(rx);

    let metrics = CountMetrics::new();
    let reader = LineReader::with_metrics(config.batch_size, metrics.clone());
    let mut buffer = vec![0u8; config.buffer_size];
    let read_result = reader.run(stream, &mut tx, &mut buffer).await;
    drop(buffer);

    // the queue is closed by now, so every worker drains and exits
    let mut worker_failure = None;
    while let Some(res) = join_set.join_next().await {
        if let Err(e) = res {
            error!(error = %e, "Counter worker failed");
            if worker_failure.is_none() {
                worker_failure = Some(e);
            }
        }
    }
    counter.finalize();

    if let Some(e) = worker_failure {
        return Err(e.into());
    }
    read_result?;

    let summary = CountSummary {
        distinct: counter.value(),
        malformed: counter.malformed(),
        oversized: metrics.get_oversized(),
        records: metrics.get_records(),
        batches: metrics.get_batches(),
        bytes: metrics.get_bytes(),
        memory_bytes: counter.allocated_bytes(),
        elapsed_secs: metrics.elapsed_secs(),
    };
    if summary.records != counter.records() {
        return Err(CountError::Other(format!(
            "reader emitted {} records but workers processed {}",
            summary.records,
            counter.records()
        )));
    }

    metrics.print_summary();
    Ok(summary)
}

pub async fn count_file(path: impl AsRef<Path>, config: &PipelineConfig) -> Result<CountSummary> {
    let path = path.as_ref();
    let file = tokio::fs::File::open(path).await?;
    info!(
        "Counting {} (workers={}, buffer={} bytes, batch={}, queue={})",
        path.display(),
        config.workers,
        config.buffer_size,
        config.batch_size,
        config.queue_capacity
    );
    count_distinct(file, config).await
}
