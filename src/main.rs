//! Domain Hunter main entry point
//!
//! This is the command-line interface for the short domain availability scanner.

use anyhow::Context;
use clap::Parser;
use domain_hunter::config::{load_config_with_hash, Config};
use domain_hunter::cursor::KeyspaceLayout;
use domain_hunter::output::{load_statistics, print_statistics};
use domain_hunter::scan::run_hunt;
use domain_hunter::storage::open_storage;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Domain Hunter: a consensus-driven short domain scanner
///
/// Domain Hunter walks every short name in a fixed order, asks several
/// availability sources about each one, and records names that a quorum of
/// sources agree are unregistered. Progress survives restarts.
#[derive(Parser, Debug)]
#[command(name = "domain-hunter")]
#[command(version = "1.0.0")]
#[command(about = "A consensus-driven short domain scanner", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start from the beginning, ignoring the saved checkpoint
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be scanned without scanning
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show progress and found domains, then exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_hunt(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("domain_hunter=info,warn"),
            1 => EnvFilter::new("domain_hunter=debug,info"),
            2 => EnvFilter::new("domain_hunter=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the keyspace, sources and limits
fn handle_dry_run(config: &Config) {
    println!("=== Domain Hunter Dry Run ===\n");

    let layout = KeyspaceLayout::from_config(&config.scan);
    println!("Keyspace:");
    println!(
        "  Lengths: {}..={} (letters only up to {})",
        config.scan.min_length, config.scan.max_length, config.scan.letters_only_max_length
    );
    println!("  TLDs: {}", config.scan.tlds.join(", "));
    let mut total: u64 = 0;
    for length in config.scan.min_length..=config.scan.max_length {
        let per_tld = layout.space_size(length);
        total = total.saturating_add(per_tld.saturating_mul(config.scan.tlds.len() as u64));
        println!("  {} characters: {} names per TLD", length, per_tld);
    }
    println!("  Total candidates per pass: {}", total);

    println!("\nConsensus:");
    println!("  Batch size: {}", config.consensus.batch_size);
    println!("  Quorum: {}", config.consensus.quorum);
    println!("  Confirm available: {}", config.consensus.confirm_available);
    println!("  Strict confirmation: {}", config.consensus.strict_confirmation);
    println!("  DNS pre-filter: {}", config.scan.dns_prefilter);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!("  - {} [{:?}, weight {}]", source.name, source.kind, source.weight);
        println!("    {}", source.url);
    }

    println!("\nEgress:");
    if config.egress.feeds.is_empty() {
        println!("  No feeds; primary egress only");
    } else {
        println!("  Target pool size: {}", config.egress.target_size);
        for feed in &config.egress.feeds {
            println!("  - {}", feed);
        }
    }

    println!("\nNotifications:");
    match &config.notify.webhook_url {
        Some(url) => println!("  Webhook: {} (finds up to {} characters)", url, config.notify.max_length),
        None => println!("  None"),
    }

    println!("\nOutput:");
    println!("  Checkpoint: {}", config.output.checkpoint_path);
    println!("  Found list: {}", config.output.found_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows saved progress and finds
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(&config.output);
    let stats = load_statistics(&storage).context("failed to read saved state")?;
    print_statistics(&stats, &config.scan.tlds);
    Ok(())
}

/// Handles the main scan, stopping cleanly on Ctrl-C or SIGTERM
async fn handle_hunt(config: Config, config_hash: String, fresh: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Scanning lengths {}..={} across {} TLDs with {} sources",
        config.scan.min_length,
        config.scan.max_length,
        config.scan.tlds.len(),
        config.sources.len()
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    match run_hunt(config, Some(config_hash), fresh, shutdown).await {
        Ok(()) => {
            tracing::info!("Scan stopped, progress saved");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scan failed: {}", e);
            Err(e.into())
        }
    }
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Received shutdown signal");
    shutdown.cancel();
}
