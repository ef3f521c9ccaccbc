//! Odds aggregation and arbitrage detection engine entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use time::OffsetDateTime;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use odds_arb::config::Config;
use odds_arb::engine::Engine;
use odds_arb::metrics;
use odds_arb::store::{JsonFileStore, Store};

/// Sports odds arbitrage detection engine.
#[derive(Parser, Debug)]
#[command(name = "odds-arb")]
#[command(about = "Aggregates bookmaker odds and detects arbitrage opportunities")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduled refresh loop (default).
    Run,

    /// Run a single refresh cycle and write the artifact.
    ScanOnce {
        /// Bypass the live cache tier for this cycle.
        #[arg(long)]
        force_refresh: bool,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Show the current daily quota state.
    Quota,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("odds_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    metrics::init_metrics();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Quota) => cmd_quota(),
        Some(Command::ScanOnce { force_refresh }) => cmd_scan_once(force_refresh).await,
        Some(Command::Run) | None => cmd_run().await,
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load()?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

fn build_engine(config: Config) -> anyhow::Result<Engine> {
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(&config.data_dir)?);
    Ok(Engine::new(config, store))
}

fn install_exporter(config: &Config) {
    if !config.metrics_enabled {
        return;
    }
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!(addr = %addr, "metrics exporter listening"),
        Err(e) => warn!(error = %e, "failed to install metrics exporter"),
    }
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("ODDS-ARB - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Base URL: {}", config.odds_api_base_url);
    println!("  Sports: {}", config.sport_keys.join(", "));
    println!("  Regions: {}", config.regions_param());
    println!("  Markets: {}", config.markets_param());
    println!("  Daily Call Limit: {}", config.daily_call_limit);
    println!("  Min Request Interval: {}s", config.min_request_interval_secs);
    println!(
        "  Cache Max Age: live {}s / pre-match {}s",
        config.live_cache_max_age_secs, config.prematch_cache_max_age_secs
    );
    println!("  Total Stake: {}", config.total_stake);
    println!("  Data Dir: {}", config.data_dir);
    println!("  Output Path: {}", config.output_path);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Show the current daily quota state.
fn cmd_quota() -> anyhow::Result<()> {
    let config = load_config()?;
    let engine = build_engine(config)?;

    let today = OffsetDateTime::now_utc().date();
    let quota = engine.client().quota();

    println!("Quota for {}:", today);
    println!("  Used:      {}", quota.calls_used(today));
    println!("  Limit:     {}", quota.daily_limit());
    println!(
        "  Remaining: {}",
        quota.daily_limit().saturating_sub(quota.calls_used(today))
    );

    Ok(())
}

/// Run a single refresh cycle.
async fn cmd_scan_once(force_refresh: bool) -> anyhow::Result<()> {
    let config = load_config()?;
    let engine = build_engine(config)?;

    let report = engine.scan(force_refresh).await;
    engine.write_artifact(&report)?;

    println!("======================================================================");
    println!(
        "Scanned {} events, {} opportunities, {} errors{}",
        report.events.len(),
        report.opportunities.len(),
        report.errors.len(),
        if report.used_stale_data { " (stale data used)" } else { "" },
    );
    for opportunity in &report.opportunities {
        println!(
            "  {} [{}] overround={} profit={}% risk={} confidence={}",
            opportunity.event,
            opportunity.market,
            opportunity.overround,
            opportunity.profit_pct,
            opportunity.risk,
            opportunity.confidence,
        );
        for leg in &opportunity.legs {
            println!(
                "    {}: {} @ {} stake {} -> {}",
                leg.outcome, leg.bookmaker, leg.odds, leg.stake, leg.payout
            );
        }
    }
    println!("======================================================================");

    Ok(())
}

/// Run the scheduled refresh loop.
async fn cmd_run() -> anyhow::Result<()> {
    let config = load_config()?;
    install_exporter(&config);
    let engine = build_engine(config)?;

    engine.run().await?;
    Ok(())
}
