//! ttlcache - read a background-refreshed cache in rounds
//!
//! Builds a cache of random strings over the given keys, prints every key's
//! value once per round while the refresher regenerates them, then stops the
//! cache and prints its statistics.

use std::collections::BTreeMap;
use std::process;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ttlcache::cli::{Cli, StartupConfig};
use ttlcache::{RandomStringGenerator, RefreshingCache};

/// Installs the stderr log subscriber, honoring `RUST_LOG` when set
fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Prints one round of reads, either as text or as a single JSON line
fn print_round(
    round: u32,
    cache: &RefreshingCache<String>,
    json: bool,
) -> Result<(), serde_json::Error> {
    if json {
        let values: BTreeMap<&str, Option<String>> = cache
            .keys()
            .iter()
            .map(|key| (key.as_str(), cache.get(key)))
            .collect();
        let line = serde_json::json!({
            "round": round,
            "generation": cache.generation(),
            "last_update": cache.last_update(),
            "values": values,
        });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        for key in cache.keys() {
            let value = cache.get(key).unwrap_or_default();
            println!("found {}, value={}", key, value);
        }
        println!("--------------------------------");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let startup = match StartupConfig::from_cli(&cli) {
        Ok(startup) => startup,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(2);
        }
    };

    init_tracing(startup.log_filter());

    let generator = RandomStringGenerator::new().with_length(startup.value_length);
    let cache = RefreshingCache::new(startup.keys.clone(), startup.cache.clone(), generator).await?;

    for round in 0..startup.rounds {
        print_round(round, &cache, startup.json)?;
        tokio::time::sleep(startup.round_interval).await;
    }

    cache.stop().await;

    let stats = cache.stats();
    if startup.json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!(
            "generation={} refreshes={} failed_refreshes={} last_update={}",
            stats.generation,
            stats.refreshes,
            stats.failed_refreshes,
            stats.last_update.to_rfc3339()
        );
    }

    Ok(())
}
