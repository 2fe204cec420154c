//! Tor v3 Vanity Onion Address Generator CLI
//!
//! Usage:
//!   onion_vanity -p fun               # Try 65536 keys per worker for "fun..."
//!   onion_vanity -p fun -n 5          # Find 5 addresses starting with "fun"
//!   onion_vanity --no-prefix -m 10    # Print 10 addresses per worker
//!   onion_vanity -p abc -d 60         # Search for one minute

use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use onion_vanity::{Config, Poll, SearchResult, StopHandle, WorkerPool};

fn main() {
    let config = Config::parse();
    init_logging(config.log_level);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        process::exit(1);
    }

    let search_config = config.search_config();

    let pool = match WorkerPool::spawn(search_config.clone()) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to start search: {}", e);
            process::exit(1);
        }
    };

    info!(
        "Prefix: {:?}, difficulty: {} ({} attempts/match)",
        pool.pattern().prefix(),
        pool.pattern().difficulty_description(),
        format_number(pool.pattern().estimated_difficulty())
    );
    info!(
        "Workers: {}, stopping: {}",
        pool.num_workers(),
        search_config.stop
    );

    // Set up ctrl-c handler
    ctrlc_handler(pool.stop_handle());

    let report_interval = Duration::from_secs(config.report_interval);

    loop {
        // Wait for result or timeout for progress report
        match pool.poll(report_interval) {
            Poll::Result(result) => print_result(&result, config.expanded),
            Poll::Timeout => print_progress(&pool),
            Poll::Finished => break,
        }
    }

    if pool.is_stopped() && pool.total_matches() == 0 {
        warn!("Search stopped without a match");
    }

    match pool.join() {
        Ok(summary) => {
            info!(
                "Found {} address(es) in {} attempts ({}/s), {}",
                summary.matches,
                format_number(summary.attempts),
                format_number(summary.keys_per_second() as u64),
                summary.stop_reason
            );
            if summary.generation_failures > 0 {
                warn!("{} key generations failed and were retried", summary.generation_failures);
            }
            println!("duration: {}ms", summary.elapsed.as_millis());
        }
        Err(e) => {
            error!("Search failed: {}", e);
            process::exit(1);
        }
    }
}

fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_result(result: &SearchResult, expanded: bool) {
    let key = if expanded {
        result.keypair.expanded_secret_key_base64()
    } else {
        result.keypair.private_key_hex()
    };
    println!("{} {}\t{}", result.index, result.address.to_hostname(), key);
}

fn print_progress(pool: &WorkerPool) {
    let keys = pool.total_keys();
    let rate = pool.keys_per_second();
    let elapsed = pool.elapsed().as_secs();

    info!(
        "[{:>4}s] Generated {} keys ({}/s), {} match(es)",
        elapsed,
        format_number(keys),
        format_number(rate as u64),
        pool.total_matches()
    );
}

fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn ctrlc_handler(stop: StopHandle) {
    if let Err(e) = ctrlc::set_handler(move || stop.stop()) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }
}
