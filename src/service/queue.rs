//! Bounded hand-off between the reader and the counter workers.
//!
//! One [`BatchSender`] feeds any number of [`BatchReceiver`] clones. Closing
//! the sender (explicitly via [`BatchSender::signal_done`] or by dropping it)
//! is the only shutdown signal: receivers drain what is left and then see
//! `None`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::error::{CountError, Result};
use crate::model::Batch;

pub fn batch_queue(capacity: usize) -> (BatchSender, BatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        BatchSender { tx: Some(tx) },
        BatchReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

pub struct BatchSender {
    tx: Option<mpsc::Sender<Batch>>,
}

impl BatchSender {
    /// Pushes a batch, waiting while the queue is full. Ownership of the
    /// batch moves to whichever worker dequeues it.
    pub async fn submit(&mut self, batch: Batch) -> Result<()> {
        let tx = self.tx.as_ref().ok_or_else(|| {
            CountError::Other("batch submitted after the queue was closed".to_string())
        })?;
        tx.send(batch)
            .await
            .map_err(|_| CountError::Other("all counter workers have exited".to_string()))
    }

    /// Closes the queue. Calling it again is a no-op.
    pub fn signal_done(&mut self) {
        if self.tx.take().is_some() {
            tracing::debug!("Batch queue closed");
        }
    }

    #[allow(dead_code)]
    pub fn is_done(&self) -> bool {
        self.tx.is_none()
    }
}

#[derive(Clone)]
pub struct BatchReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
}

impl BatchReceiver {
    /// Next batch in FIFO order, or `None` once the sender is closed and the
    /// queue is empty.
    pub async fn recv(&self) -> Option<Batch> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_then_closed() {
        let (mut tx, rx) = batch_queue(4);
        tx.submit(vec![1u32].into()).await.unwrap();
        tx.submit(vec![2u32].into()).await.unwrap();
        tx.signal_done();

        assert_eq!(rx.recv().await, Some(Batch::Keys(vec![1])));
        assert_eq!(rx.recv().await, Some(Batch::Keys(vec![2])));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_signal_done_idempotent() {
        let (mut tx, rx) = batch_queue(1);
        tx.signal_done();
        tx.signal_done();
        assert!(tx.is_done());
        assert!(tx.submit(vec![1u32].into()).await.is_err());
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_drop_closes_queue() {
        let (tx, rx) = batch_queue(1);
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_bounded_sender_waits_for_consumer() {
        let (mut tx, rx) = batch_queue(1);
        let producer = tokio::spawn(async move {
            for i in 0..10u32 {
                tx.submit(vec![i].into()).await.unwrap();
            }
        });

        let mut received = Vec::new();
        while let Some(Batch::Keys(keys)) = rx.recv().await {
            received.extend(keys);
        }
        producer.await.unwrap();
        assert_eq!(received, (0..10).collect::<Vec<u32>>());
    }
}
