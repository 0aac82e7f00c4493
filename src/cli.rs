//! Command-line interface parsing for the ttlcache demo
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a validated [`StartupConfig`] for the binary.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::cache::CacheConfig;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// `--ttl 0`
    #[error("Invalid TTL: must be at least 1 second")]
    InvalidTtl,

    /// `--keys` contained no non-empty key
    #[error("No keys given: pass at least one key with --keys")]
    NoKeys,

    /// `--length 0`
    #[error("Invalid length: generated values must be at least 1 character")]
    InvalidLength,

    /// `--timeout-ms 0`
    #[error("Invalid timeout: must be at least 1 millisecond")]
    InvalidTimeout,
}

/// ttlcache - Read a background-refreshed cache of random values
#[derive(Parser, Debug)]
#[command(name = "ttlcache")]
#[command(about = "Demo of an in-memory cache regenerated in the background on a TTL")]
#[command(version)]
pub struct Cli {
    /// Keys to cache, comma separated
    #[arg(short, long, value_delimiter = ',', default_values = ["apple", "orange", "banana"])]
    pub keys: Vec<String>,

    /// Seconds before the cached values are regenerated
    #[arg(long, default_value_t = 10)]
    pub ttl: u64,

    /// Upper bound in milliseconds for generating a single value
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Number of read rounds before exiting
    #[arg(long, default_value_t = 10)]
    pub rounds: u32,

    /// Seconds to wait between read rounds
    #[arg(long, default_value_t = 8)]
    pub interval: u64,

    /// Length of generated values
    #[arg(long, default_value_t = 10)]
    pub length: usize,

    /// Print each round as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Keys to cache, empty entries removed
    pub keys: Vec<String>,
    /// Configuration handed to the cache
    pub cache: CacheConfig,
    /// Number of read rounds
    pub rounds: u32,
    /// Pause between read rounds
    pub round_interval: Duration,
    /// Length of generated values
    pub value_length: usize,
    /// Whether rounds are printed as JSON
    pub json: bool,
    /// Whether debug logging is enabled
    pub verbose: bool,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if an argument is out of range
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.ttl == 0 {
            return Err(CliError::InvalidTtl);
        }
        if cli.length == 0 {
            return Err(CliError::InvalidLength);
        }

        let keys: Vec<String> = cli
            .keys
            .iter()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();
        if keys.is_empty() {
            return Err(CliError::NoKeys);
        }

        let mut cache = CacheConfig::default().with_ttl(Duration::from_secs(cli.ttl));
        match cli.timeout_ms {
            Some(0) => return Err(CliError::InvalidTimeout),
            Some(ms) => cache = cache.with_generate_timeout(Duration::from_millis(ms)),
            None => {}
        }

        Ok(StartupConfig {
            keys,
            cache,
            rounds: cli.rounds,
            round_interval: Duration::from_secs(cli.interval),
            value_length: cli.length,
            json: cli.json,
            verbose: cli.verbose,
        })
    }

    /// Default log filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "ttlcache=debug"
        } else {
            "ttlcache=info"
        }
    }
}
