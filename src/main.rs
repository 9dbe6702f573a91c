//! Polymarket Winnings Claimer CLI
//!
//! Redeems resolved Polymarket positions for a wallet.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use polymarket_claimer::{ClaimRun, ClaimService, ClaimTrigger, Config, Database};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "polymarket-claimer")]
#[command(about = "Redeem resolved Polymarket positions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Redeem every redeemable position once
    Claim,

    /// Show the redemption path and the last run
    Status,

    /// Show recent claim runs
    History {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;

    match cli.command {
        Commands::Claim => claim(config).await?,
        Commands::Status => show_status(config).await?,
        Commands::History { limit } => show_history(&config, limit).await?,
    }

    Ok(())
}

async fn claim(config: Config) -> Result<()> {
    let db = Arc::new(Database::new(&config.database_path).await?);
    let service = ClaimService::from_config(Arc::new(config), db);

    println!("\n{}", "=".repeat(70));
    println!("  POLYMARKET CLAIMER");
    println!(
        "  Path: {} | Wallet: {}",
        service.strategy_name(),
        service.config().wallet_address.as_deref().unwrap_or("NOT SET")
    );
    println!("{}\n", "=".repeat(70));

    let run = service.run_claim(ClaimTrigger::Cli).await?;
    print_run(&run, true);

    if let Some(error) = run.error {
        anyhow::bail!("Claim run failed: {}", error);
    }
    Ok(())
}

async fn show_status(config: Config) -> Result<()> {
    let db = Arc::new(Database::new(&config.database_path).await?);
    let service = ClaimService::from_config(Arc::new(config), db.clone());

    println!("\n{}", "=".repeat(70));
    println!("  CLAIMER STATUS");
    println!("{}\n", "=".repeat(70));

    println!("  Redeem path:     {}", service.strategy_name());
    println!(
        "  Wallet:          {}",
        service.config().wallet_address.as_deref().unwrap_or("NOT SET")
    );
    println!(
        "  Signing key:     {}",
        if service.config().private_key.is_some() { "SET" } else { "NOT SET" }
    );
    println!(
        "  Auto-claim:      {} (every {}s)",
        if service.auto_claim_enabled().await { "ENABLED" } else { "DISABLED" },
        service.config().auto_claim_interval_seconds
    );
    println!("  Total claimed:   {}", db.total_claimed().await?);

    match db.last_claim_run().await? {
        Some(run) => {
            println!("\nLast run:");
            print_run(&run, false);
        }
        None => println!("\nNo claim runs recorded yet."),
    }

    Ok(())
}

async fn show_history(config: &Config, limit: i64) -> Result<()> {
    let db = Database::new(&config.database_path).await?;
    let runs = db.recent_claim_runs(limit.max(1)).await?;

    println!("\n{}", "=".repeat(70));
    println!("  CLAIM HISTORY ({} runs)", runs.len());
    println!("{}\n", "=".repeat(70));

    for run in &runs {
        let outcome = match (&run.result, &run.error) {
            (_, Some(error)) => format!("ERROR {}", error).red().to_string(),
            (Some(result), None) if result.failed > 0 => result.to_string().yellow().to_string(),
            (Some(result), None) => result.to_string().green().to_string(),
            (None, None) => "-".to_string(),
        };
        println!(
            "  {} {:<9} {:<8} {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.trigger.as_str(),
            run.strategy.as_deref().unwrap_or("-"),
            outcome
        );
    }

    Ok(())
}

fn print_run(run: &ClaimRun, verbose: bool) {
    println!(
        "  Started:  {} ({} ms, {})",
        run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        run.duration_ms(),
        run.trigger
    );

    if let Some(error) = &run.error {
        println!("  {}", format!("Run failed: {}", error).red());
        return;
    }

    let Some(result) = &run.result else {
        return;
    };

    if result.is_empty() {
        println!("  Nothing to claim.");
        return;
    }

    println!("  Claimed:  {}", result.claimed.to_string().green());
    if result.failed > 0 {
        println!("  Failed:   {}", result.failed.to_string().red());
    } else {
        println!("  Failed:   0");
    }

    if verbose {
        for hash in &result.tx_hashes {
            println!("    tx {}", hash);
        }
        for error in &result.errors {
            println!("    {}", error.yellow());
        }
    }
}
