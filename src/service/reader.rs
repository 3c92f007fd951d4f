use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use crate::error::{CountError, Result};
use crate::metrics::CountMetrics;
use crate::model::{Batch, LineBatch, MAX_ADDRESS_LEN};
use crate::service::BatchSender;

/// Smallest usable read buffer: the longest dotted quad plus "\r\n".
pub const MIN_BUFFER_SIZE: usize = MAX_ADDRESS_LEN + 2;

/// Longer records are dropped without being buffered.
pub const MAX_RECORD_LEN: usize = 64;

const PROGRESS_INTERVAL: u64 = 256 * 1024 * 1024;

/// Turns a byte stream into batches of newline-terminated records.
pub struct LineReader {
    batch_size: usize,
    metrics: CountMetrics,
}

impl LineReader {
    pub fn with_metrics(batch_size: usize, metrics: CountMetrics) -> Self {
        LineReader {
            batch_size: batch_size.max(1),
            metrics,
        }
    }

    /// Reads `stream` to the end through `buffer`, pushing batches into
    /// `queue`, then closes the queue.
    ///
    /// Records split across reads are carried over and joined. Blank lines
    /// are dropped, a trailing `\r` is stripped, and a final record without a
    /// newline is still emitted. A read error ends the run: the batch being
    /// filled is discarded, the queue is closed and the error is returned.
    pub async fn run<R>(
        &self,
        stream: R,
        queue: &mut BatchSender,
        buffer: &mut [u8],
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        if buffer.len() < MIN_BUFFER_SIZE {
            queue.signal_done();
            return Err(CountError::Config(format!(
                "buffer size {} is below the length of one IPv4 record ({} bytes)",
                buffer.len(),
                MIN_BUFFER_SIZE
            )));
        }

        let outcome = self.read_all(stream, queue, buffer).await;
        queue.signal_done();
        outcome
    }

    async fn read_all<R>(
        &self,
        mut stream: R,
        queue: &mut BatchSender,
        buffer: &mut [u8],
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut batch = LineBatch::with_capacity(self.batch_size);
        let mut residual: Vec<u8> = Vec::with_capacity(MAX_RECORD_LEN + 1);
        // set while skipping the tail of a record that outgrew MAX_RECORD_LEN
        let mut discarding = false;
        let mut next_progress = PROGRESS_INTERVAL;

        loop {
            let n = match stream.read(buffer).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!(error = %e, pending = batch.len(), "Read failed");
                    return Err(CountError::Read(e));
                }
            };
            self.metrics.add_bytes(n as u64);

            let mut chunk = &buffer[..n];
            while let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
                let line = &chunk[..pos];
                chunk = &chunk[pos + 1..];

                if discarding {
                    discarding = false;
                    self.metrics.increment_oversized();
                } else if residual.is_empty() {
                    self.push_record(&mut batch, line);
                } else {
                    residual.extend_from_slice(line);
                    self.push_record(&mut batch, &residual);
                    residual.clear();
                }

                if batch.len() >= self.batch_size {
                    self.flush(&mut batch, queue).await?;
                }
            }

            if !chunk.is_empty() && !discarding {
                residual.extend_from_slice(chunk);
                if residual.len() > MAX_RECORD_LEN {
                    residual.clear();
                    discarding = true;
                }
            }

            if self.metrics.get_bytes() >= next_progress {
                next_progress += PROGRESS_INTERVAL;
                info!(
                    "Read progress: {} MB, {} records - {:.2} MB/sec",
                    self.metrics.get_bytes() / 1024 / 1024,
                    self.metrics.get_records() + batch.len() as u64,
                    self.metrics.get_throughput_mb()
                );
            }
        }

        // the last record need not end with a newline
        if discarding {
            self.metrics.increment_oversized();
        } else if !residual.is_empty() {
            self.push_record(&mut batch, &residual);
        }
        if !batch.is_empty() {
            self.flush(&mut batch, queue).await?;
        }

        debug!(
            bytes = self.metrics.get_bytes(),
            records = self.metrics.get_records(),
            batches = self.metrics.get_batches(),
            "Reached end of stream"
        );
        Ok(())
    }

    fn push_record(&self, batch: &mut LineBatch, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return;
        }
        if line.len() > MAX_RECORD_LEN {
            self.metrics.increment_oversized();
            return;
        }
        batch.push(line);
    }

    async fn flush(&self, batch: &mut LineBatch, queue: &mut BatchSender) -> Result<()> {
        let full = std::mem::replace(batch, LineBatch::with_capacity(self.batch_size));
        self.metrics.add_batch(full.len() as u64);
        queue.submit(Batch::Lines(full)).await
    }
}
