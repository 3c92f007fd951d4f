use std::path::Path;

use serde::Deserialize;

use crate::error::{CountError, Result};
use crate::service::MIN_BUFFER_SIZE;

pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

pub const MAX_BUFFER_SIZE: usize = 1 << 30;
pub const MAX_BATCH_SIZE: usize = 1 << 20;
pub const MAX_QUEUE_CAPACITY: usize = tokio::sync::Semaphore::MAX_PERMITS;
pub const MAX_WORKERS: usize = 4096;

/// What to do with a record that is not a dotted-quad address.
/// Either way the record is dropped and counted, never fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Drop silently (debug log only)
    #[default]
    Skip,
    /// Log every dropped record at warn level
    Warn,
}

/// Settings for one counting run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Size of the reusable read buffer in bytes
    pub buffer_size: usize,
    /// Records per batch handed to the workers
    pub batch_size: usize,
    /// Batches the queue holds before the reader waits
    pub queue_capacity: usize,
    /// Number of counter workers
    pub workers: usize,
    pub malformed: MalformedPolicy,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(CountError::Config(format!(
                "buffer size {} is below the length of one IPv4 record ({} bytes)",
                self.buffer_size, MIN_BUFFER_SIZE
            )));
        }
        check_range("buffer size", self.buffer_size, MIN_BUFFER_SIZE, MAX_BUFFER_SIZE)?;
        check_range("batch size", self.batch_size, 1, MAX_BATCH_SIZE)?;
        check_range("queue capacity", self.queue_capacity, 1, MAX_QUEUE_CAPACITY)?;
        check_range("worker count", self.workers, 1, MAX_WORKERS)?;
        Ok(())
    }

    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4)
    }
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(CountError::Config(format!(
            "{} {} is outside the allowed range {}..={}",
            name, value, min, max
        )));
    }
    Ok(())
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            buffer_size: DEFAULT_BUFFER_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: Self::default_workers(),
            malformed: MalformedPolicy::default(),
        }
    }
}

/// Optional TOML settings file. Every key may be omitted.
///
/// ```toml
/// input = "/data/ip_addresses"
/// buffer_size = 1048576
/// batch_size = 1000
/// queue_capacity = 64
/// workers = 8
/// malformed = "warn"
/// ```
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub input: Option<String>,
    pub buffer_size: Option<usize>,
    pub batch_size: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub workers: Option<usize>,
    pub malformed: Option<MalformedPolicy>,
}

impl FileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::parse(&text)
            .map_err(|e| CountError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
