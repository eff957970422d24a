//! rules-sync — keeps the rule files and the in-memory rule sets in step.
//!
//! Creates the rule root and the five rule files if they are missing, loads
//! them, and polls them for external edits until Ctrl-C. Every accepted
//! change is logged through a per-kind subscriber, standing in for the
//! enforcement engine that would consume the rules in a real service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use sentinel_sync_core::{load_dotenv, Config};
use sentinel_sync_rules::datasource::codec_for;
use sentinel_sync_rules::{RuleContext, RuleKind};

// ── CLI ─────────────────────────────────────────────────────────────

/// File-backed rule synchronization for traffic-control policy.
#[derive(Parser, Debug)]
#[command(name = "rules-sync", version, about)]
struct Cli {
    /// Rule root directory (overrides SENTINEL_RULE_DIR).
    #[arg(long)]
    rule_dir: Option<PathBuf>,

    /// Poll interval in milliseconds (overrides SENTINEL_RULE_POLL_INTERVAL_MS).
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Print every kind's current rules as JSON and exit.
    #[arg(long)]
    dump: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.rule_dir {
        config.rules.root_dir = dir;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.rules.poll_interval = Duration::from_millis(ms);
    }
    config.log_summary();

    // A rule root that cannot be prepared is fatal.
    let context = Arc::new(RuleContext::bootstrap(&config.rules)?);

    if cli.dump {
        for kind in RuleKind::ALL {
            let rules = context.current(kind);
            let json = codec_for(kind).encode(&rules)?;
            println!("// {}", context.layout().descriptor(kind).path().display());
            print!("{}", String::from_utf8_lossy(&json));
        }
        return Ok(());
    }

    for kind in RuleKind::ALL {
        context.property(kind).add_subscriber("rules-sync-log", move |rules| {
            info!(kind = %kind, rules = rules.len(), "active rule set");
            Ok(())
        });
    }

    let handle = context.start();
    info!(watchers = handle.len(), "rules-sync running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    handle.shutdown().await;
    info!("rules-sync exited cleanly");
    Ok(())
}
