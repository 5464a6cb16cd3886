//! mimir - inspect and maintain a cache snapshot
//!
//! Loads the snapshot named in the configuration, runs one command and,
//! for mutating commands, writes the snapshot back.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mimir::config::Config;
use mimir::persistence::FsBackend;
use mimir::{CachingClient, PlanStatus, SnapshotStatus, UsageBucket, UsageScope};

/// Mimir cache and usage CLI
#[derive(Parser)]
#[command(name = "mimir")]
#[command(version = mimir::PKG_VERSION)]
#[command(about = "Inspect and maintain a mimir cache snapshot")]
struct Args {
    /// Config file (default: ~/.mimir/config.toml if present)
    #[arg(short, long, env = "MIMIR_CONFIG")]
    config: Option<PathBuf>,

    /// Snapshot file (overrides snapshot.path from the config)
    #[arg(short, long, env = "MIMIR_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Save after a mutating command even if the existing snapshot could
    /// not be read (it is replaced)
    #[arg(long)]
    force: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show cache occupancy and hit/miss totals
    Summary,

    /// Show usage counters
    Stats {
        /// today, month or all-time
        #[arg(long, default_value = "today")]
        scope: UsageScope,
        /// Also show the sum of the last N days
        #[arg(long)]
        days: Option<u32>,
    },

    /// Remove expired entries
    Sweep,

    /// Remove entries whose key matches a regular expression
    Invalidate {
        /// Pattern searched for anywhere in the key
        pattern: String,
    },

    /// Remove every cached entry (usage counters are kept)
    Clear,

    /// Show this month's usage against the configured plan
    Plan,
}

impl Command {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Command::Sweep | Command::Invalidate { .. } | Command::Clear
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let snapshot_path = match args.snapshot {
        Some(path) => path,
        None => config.snapshot_path()?,
    };

    let backend = FsBackend::new();
    let (client, status) = config
        .client_builder()?
        .load(&backend, &snapshot_path)
        .await?;

    if let SnapshotStatus::Discarded(reason) = &status {
        eprintln!(
            "warning: could not read {} ({reason}); showing an empty cache",
            snapshot_path.display()
        );
        if args.command.mutates() && !args.force {
            return Err(format!(
                "refusing to overwrite {}; pass --force to replace it",
                snapshot_path.display()
            )
            .into());
        }
    }

    match &args.command {
        Command::Summary => print_summary(&client)?,

        Command::Stats { scope, days } => {
            let snapshot = client.stats(*scope)?;
            match &snapshot.period {
                Some(period) => println!("{} ({period})", snapshot.scope),
                None => println!("{}", snapshot.scope),
            }
            print_bucket(&snapshot.usage);
            if *scope == UsageScope::Month {
                let projection = client.month_projection()?;
                println!("  saved/day:    {:.4}", projection.average_daily_saved);
                println!("  projected:    {:.4}", projection.projected_monthly_saved);
            }
            if let Some(days) = days {
                println!("\nlast {days} days");
                print_bucket(&client.recent_usage(*days)?);
            }
        }

        Command::Sweep => {
            let removed = client.invalidate_expired()?;
            println!("removed {removed} expired entries");
        }

        Command::Invalidate { pattern } => {
            let removed = client.invalidate_matching(pattern)?;
            println!("removed {removed} entries matching '{pattern}'");
        }

        Command::Clear => {
            let size = client.cache_summary()?.size;
            client.invalidate_all()?;
            println!("removed {size} entries");
        }

        Command::Plan => {
            let plan = client.plan();
            let status = client.plan_status()?;
            println!("plan:       {}", plan.name);
            println!("this month: {status}");
            if let Some(remaining) = status.remaining() {
                println!("remaining:  {remaining}");
            }
            match status {
                PlanStatus::Warning { .. } => println!("warning: approaching the monthly limit"),
                PlanStatus::Exceeded { .. } => println!("warning: monthly limit exceeded"),
                PlanStatus::Within { .. } | PlanStatus::Unlimited => {}
            }
        }
    }

    if args.command.mutates() {
        client.save(&backend, &snapshot_path).await?;
    }

    Ok(())
}

fn print_summary(client: &CachingClient) -> mimir::Result<()> {
    let info = client.cache_info()?;
    let counters = client.counters()?;
    println!("entries:     {}/{}", info.size, info.capacity);
    println!("utilization: {:.1}%", info.utilization_ratio * 100.0);
    println!("active:      {}", info.active_count);
    println!("expired:     {}", info.expired_count);
    if let (Some(oldest), Some(newest)) = (info.oldest_entry, info.newest_entry) {
        println!("oldest:      {}", oldest.to_rfc3339());
        println!("newest:      {}", newest.to_rfc3339());
    }
    println!("hits:        {}", counters.hits);
    println!("misses:      {}", counters.misses);
    println!("hit rate:    {:.1}%", counters.hit_rate() * 100.0);
    println!("evictions:   {}", counters.evictions);
    println!("expirations: {}", counters.expirations);
    Ok(())
}

fn print_bucket(usage: &UsageBucket) {
    println!("  requests:     {}", usage.requests);
    println!("  tokens used:  {}", usage.tokens_used);
    println!("  tokens saved: {}", usage.tokens_saved);
    println!("  cost billed:  {:.4}", usage.cost_billed);
    println!("  cost saved:   {:.4}", usage.cost_saved);
    println!("  savings:      {:.1}%", usage.savings_ratio() * 100.0);
}
