use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    FileConfig, MalformedPolicy, PipelineConfig, DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE,
    DEFAULT_QUEUE_CAPACITY,
};
use crate::error::{CountError, Result};

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "ip-counter")]
#[command(author = "IP Counter")]
#[command(version = "0.1.0")]
#[command(about = "Count distinct IPv4 addresses in a newline-delimited file", long_about = None)]
pub struct Args {
    /// Input file, one IPv4 address per line ("-" reads stdin)
    #[arg(env = "IPCOUNT_INPUT")]
    pub input: Option<String>,

    /// TOML settings file; command line values take precedence
    #[arg(short = 'c', long, env = "IPCOUNT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Read buffer size in bytes (defaults to 1 MiB)
    #[arg(short = 'b', long, env = "IPCOUNT_BUFFER_SIZE")]
    pub buffer_size: Option<usize>,

    /// Records per batch (defaults to 1000)
    #[arg(long, env = "IPCOUNT_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Batches buffered between reader and workers (defaults to 64)
    #[arg(short = 'q', long, env = "IPCOUNT_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Number of counter workers (defaults to available parallelism)
    #[arg(short = 'w', long, env = "IPCOUNT_WORKERS")]
    pub workers: Option<usize>,

    /// Handling of lines that are not IPv4 addresses
    #[arg(short = 'm', long, env = "IPCOUNT_MALFORMED", value_enum)]
    pub malformed: Option<MalformedPolicy>,

    /// Result format
    #[arg(short = 'f', long, env = "IPCOUNT_FORMAT", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short = 'v', long, env = "IPCOUNT_VERBOSE")]
    pub verbose: bool,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub input: String,
    pub pipeline: PipelineConfig,
    pub format: OutputFormat,
    pub verbose: bool,
}

impl Args {
    /// Merges command line, optional config file and defaults, in that
    /// order of precedence, and validates the result.
    pub fn merge_with_config(self) -> Result<RunSettings> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        self.merge(file)
    }

    fn merge(self, file: FileConfig) -> Result<RunSettings> {
        let input = self
            .input
            .or(file.input)
            .ok_or_else(|| CountError::Config("no input file given".to_string()))?;

        let pipeline = PipelineConfig {
            buffer_size: self.buffer_size.or(file.buffer_size).unwrap_or(DEFAULT_BUFFER_SIZE),
            batch_size: self.batch_size.or(file.batch_size).unwrap_or(DEFAULT_BATCH_SIZE),
            queue_capacity: self
                .queue_capacity
                .or(file.queue_capacity)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            workers: self
                .workers
                .or(file.workers)
                .unwrap_or_else(PipelineConfig::default_workers),
            malformed: self.malformed.or(file.malformed).unwrap_or_default(),
        };
        pipeline.validate()?;

        Ok(RunSettings {
            input,
            pipeline,
            format: self.format,
            verbose: self.verbose,
        })
    }
}
