use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::MalformedPolicy;
use crate::model::{parse_ipv4, Batch, PresenceSet};
use crate::service::BatchReceiver;

/// Shared presence set plus the running count of first-time insertions.
///
/// Many workers may call [`PresenceCounter::submit`] at once. The bit flip
/// and the increment happen in [`PresenceCounter::insert`]: the atomic
/// `fetch_or` picks exactly one winner per key and only the winner bumps the
/// counter, so `value()` equals the number of set bits once every submit has
/// returned.
pub struct PresenceCounter {
    set: PresenceSet,
    distinct: AtomicU64,
    records: AtomicU64,
    malformed: AtomicU64,
    finalized: AtomicBool,
    policy: MalformedPolicy,
}

impl PresenceCounter {
    pub fn new(policy: MalformedPolicy) -> Self {
        PresenceCounter {
            set: PresenceSet::new(),
            distinct: AtomicU64::new(0),
            records: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            finalized: AtomicBool::new(false),
            policy,
        }
    }

    /// Returns `true` if `key` had not been seen before.
    #[inline]
    pub fn insert(&self, key: u32) -> bool {
        if self.set.test_and_set(key) {
            self.distinct.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Feeds one batch into the set. Unparsable records are dropped and
    /// counted; they never abort the batch.
    pub fn submit(&self, batch: &Batch) {
        debug_assert!(!self.is_finalized(), "submit after finalize");

        match batch {
            Batch::Keys(keys) => {
                for &key in keys {
                    self.insert(key);
                }
            }
            Batch::Lines(lines) => {
                let mut malformed = 0u64;
                for line in lines.iter() {
                    match parse_ipv4(line) {
                        Some(key) => {
                            self.insert(key);
                        }
                        None => {
                            malformed += 1;
                            self.report_malformed(line);
                        }
                    }
                }
                if malformed > 0 {
                    self.malformed.fetch_add(malformed, Ordering::Relaxed);
                }
            }
        }
        self.records.fetch_add(batch.len() as u64, Ordering::Relaxed);
    }

    fn report_malformed(&self, line: &[u8]) {
        let record = String::from_utf8_lossy(line);
        match self.policy {
            MalformedPolicy::Skip => debug!(record = %record, "Skipping malformed record"),
            MalformedPolicy::Warn => warn!(record = %record, "Skipping malformed record"),
        }
    }

    /// Marks the end of submissions. Safe to call more than once.
    pub fn finalize(&self) {
        if !self.finalized.swap(true, Ordering::AcqRel) {
            debug!(distinct = self.value(), malformed = self.malformed(), "Counter finalized");
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Distinct addresses seen so far. Only final once every worker has
    /// been joined.
    pub fn value(&self) -> u64 {
        self.distinct.load(Ordering::Acquire)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Acquire)
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Acquire)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.set.allocated_bytes()
    }

    #[cfg(test)]
    pub(crate) fn presence(&self) -> &PresenceSet {
        &self.set
    }

    /// Worker loop: drains the queue until the reader closes it.
    pub async fn run_worker(self: Arc<Self>, worker_id: usize, rx: BatchReceiver) -> u64 {
        let mut batches = 0u64;
        while let Some(batch) = rx.recv().await {
            self.submit(&batch);
            batches += 1;
        }
        debug!(worker = worker_id, batches = batches, "Counter worker finished");
        batches
    }
}

impl Default for PresenceCounter {
    fn default() -> Self {
        Self::new(MalformedPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ipv4_to_index, LineBatch};
    use crate::service::batch_queue;
    use rand::Rng;
    use std::collections::HashSet;
    use tokio::task::JoinSet;

    fn keys(ips: &[&str]) -> Batch {
        Batch::Keys(ips.iter().map(|ip| ipv4_to_index(ip).unwrap()).collect())
    }

    fn lines(ips: &[&str]) -> Batch {
        let mut batch = LineBatch::with_capacity(ips.len());
        for ip in ips {
            batch.push(ip.as_bytes());
        }
        Batch::Lines(batch)
    }

    #[test]
    fn test_three_distinct() {
        let counter = PresenceCounter::default();
        counter.submit(&keys(&["127.0.0.1", "127.0.0.2", "127.0.0.3"]));
        counter.finalize();
        assert_eq!(counter.value(), 3);
    }

    #[test]
    fn test_three_distinct_out_of_four() {
        let counter = PresenceCounter::default();
        counter.submit(&keys(&["127.0.0.1", "127.0.0.2", "127.0.0.3", "127.0.0.3"]));
        counter.finalize();
        assert_eq!(counter.value(), 3);
        assert_eq!(counter.records(), 4);
    }

    #[test]
    fn test_idempotent_insert() {
        let counter = PresenceCounter::default();
        assert!(counter.insert(42));
        for _ in 0..100 {
            assert!(!counter.insert(42));
        }
        assert_eq!(counter.value(), 1);
    }

    #[test]
    fn test_raw_lines_and_malformed() {
        let counter = PresenceCounter::new(MalformedPolicy::Warn);
        counter.submit(&lines(&["10.0.0.1", "not-an-ip", "10.0.0.1", "300.0.0.1", "010.0.0.1"]));
        assert_eq!(counter.value(), 1);
        assert_eq!(counter.malformed(), 2);
        assert_eq!(counter.records(), 5);
    }

    #[test]
    fn test_keys_and_lines_share_keyspace() {
        let counter = PresenceCounter::default();
        counter.submit(&keys(&["192.168.0.1"]));
        counter.submit(&lines(&["192.168.0.1", "192.168.0.2"]));
        assert_eq!(counter.value(), 2);
    }

    #[test]
    fn test_finalize_twice() {
        let counter = PresenceCounter::default();
        counter.finalize();
        counter.finalize();
        assert!(counter.is_finalized());
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_counter_matches_popcount() {
        let counter = PresenceCounter::default();
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let batch: Vec<u32> = (0..500)
                .map(|_| 0x0A00_0000 | rng.gen_range(0..5000u32))
                .collect();
            counter.submit(&Batch::Keys(batch));
            assert_eq!(counter.value(), counter.presence().count_ones());
        }
    }

    #[test]
    fn test_concurrent_overlapping_threads() {
        let counter = PresenceCounter::default();
        let mut rng = rand::thread_rng();
        // two high bytes only, so at most two segments are allocated
        let batches: Vec<Vec<u32>> = (0..64)
            .map(|_| {
                (0..2000)
                    .map(|_| {
                        let high = if rng.gen_bool(0.5) { 0x0A00_0000 } else { 0xC000_0000 };
                        high | rng.gen_range(0..20_000u32)
                    })
                    .collect()
            })
            .collect();
        let expected: HashSet<u32> = batches.iter().flatten().copied().collect();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for batch in &batches {
                        counter.submit(&Batch::Keys(batch.clone()));
                    }
                });
            }
        });
        counter.finalize();

        assert_eq!(counter.value(), expected.len() as u64);
        assert_eq!(counter.presence().count_ones(), expected.len() as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_workers_drain_queue() {
        let counter = Arc::new(PresenceCounter::default());
        let (mut tx, rx) = batch_queue(2);

        let mut join_set = JoinSet::new();
        for id in 0..10 {
            join_set.spawn(counter.clone().run_worker(id, rx.clone()));
        }

        // every batch repeats the same hot key plus a slice of a shared range
        for i in 0..200u32 {
            let mut batch = vec![ipv4_to_index("127.0.0.1").unwrap()];
            batch.extend((i % 50) * 10..(i % 50) * 10 + 20);
            tx.submit(Batch::Keys(batch)).await.unwrap();
        }
        tx.signal_done();

        let mut batches = 0;
        while let Some(res) = join_set.join_next().await {
            batches += res.unwrap();
        }
        counter.finalize();

        assert_eq!(batches, 200);
        // keys 0..510 plus 127.0.0.1
        assert_eq!(counter.value(), 511);
    }
}
