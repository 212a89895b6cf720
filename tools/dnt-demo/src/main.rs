// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DNT demo
//!
//! Publishes tables with rotating keys (`k{i%3} = v{i}`) once per period and
//! echoes every change seen by a subscriber sharing the in-process substrate.
//!
//! # Usage
//!
//! ```bash
//! # Publish FromServer once per second until Ctrl+C
//! dnt-demo run
//!
//! # Ten updates, 200 ms apart
//! dnt-demo run --period-ms 200 --count 10
//!
//! # Tables from a configuration file
//! dnt-demo gen-config --output dnt.toml
//! dnt-demo validate --config dnt.toml
//! dnt-demo run --config dnt.toml
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dnt::config::Direction;
use dnt::{ClosureListener, DntConfig, LoopbackSubstrate, Table, TableRegistry};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Directional network tables demo
#[derive(Parser, Debug)]
#[command(name = "dnt-demo")]
#[command(about = "DNT demo - publish a rotating table and echo it through a subscriber")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error); overrides the
    /// configuration file, defaults to info
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish and echo tables until Ctrl+C or --count updates
    Run {
        /// Configuration file (default: publish FromServer every second)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Delay between sends in milliseconds
        #[arg(long, default_value = "1000")]
        period_ms: u64,

        /// Stop after N sends per table (0 = unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u64,

        /// Address or team number the echoing client connects to
        #[arg(long, default_value = "127.0.0.1")]
        target: String,
    },

    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "dnt.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let run_config = match &args.command {
        Commands::Run { config, .. } => Some(load_config(config.as_deref())?),
        _ => None,
    };

    let level = resolve_log_level(args.log_level.as_deref(), run_config.as_ref());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Commands::Run {
            period_ms,
            count,
            target,
            ..
        } => cmd_run(
            run_config.unwrap_or_else(DntConfig::example),
            Duration::from_millis(period_ms),
            count,
            &target,
        ),
        Commands::GenConfig { output } => cmd_gen_config(&output),
        Commands::Validate { config } => cmd_validate(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<DntConfig> {
    match path {
        Some(path) => DntConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(DntConfig::example()),
    }
}

/// `--log-level` wins over the configuration file's `log_level`.
fn resolve_log_level(cli: Option<&str>, config: Option<&DntConfig>) -> String {
    cli.map(str::to_string)
        .or_else(|| config.map(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string())
}

fn cmd_run(config: DntConfig, period: Duration, count: u64, target: &str) -> Result<()> {

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let substrate = Arc::new(LoopbackSubstrate::new());

    // Publishing side, as described by the configuration.
    let publisher = TableRegistry::new(substrate.clone());
    let tables = config.apply(&publisher)?;
    let published: Vec<Arc<Table>> = tables.into_iter().filter(|t| t.is_writable()).collect();
    if published.is_empty() {
        bail!("configuration publishes no tables");
    }

    // Echoing side: subscribe to everything the publisher sends.
    let echo = TableRegistry::new(substrate);
    echo.start_client(target)?;
    for table in &published {
        let mirror = echo.subscribe(table.name())?;
        mirror.on_change(Arc::new(ClosureListener::new(print_change)));
    }

    println!("DNT demo v{}", dnt::VERSION);
    println!("=====================================");
    for table in &published {
        println!("Publishing: {} (interval {:?})", table.name(), table.interval());
    }
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let mut i: u64 = 0;
    while running.load(Ordering::SeqCst) && (count == 0 || i < count) {
        for table in &published {
            let key = format!("k{}", i % 3);
            let value = format!("v{}", i);
            info!("Setting {}.{} to {}", table.name(), key, value);
            table.set_value(&key, value)?;
        }

        sleep_while_running(&running, period);
        if !running.load(Ordering::SeqCst) {
            break;
        }

        for table in &published {
            debug!("Sending {}", table.name());
            if let Err(e) = table.send() {
                warn!("Send of {} failed: {}", table.name(), e);
            }
        }
        i += 1;
    }

    // Let the last deliveries reach the echo side.
    thread::sleep(Duration::from_millis(100));
    for name in echo.table_names() {
        if let Some(mirror) = echo.get(&name) {
            if mirror.is_stale() {
                println!("{} is stale", name);
            }
        }
    }
    println!("\nShutting down after {} sends", i);
    Ok(())
}

fn sleep_while_running(running: &AtomicBool, period: Duration) {
    let deadline = Instant::now() + period;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}

fn print_change(table: &Table) {
    println!("*** Changed: {}", table.name());
    let mut entries: Vec<_> = table.snapshot().into_iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{} => {}", key, value);
    }
}

fn cmd_gen_config(output: &Path) -> Result<()> {
    let toml_str = DntConfig::example().to_toml()?;

    let content = format!(
        r#"# DNT Configuration
# Generated by dnt-demo gen-config

{}
"#,
        toml_str
    );

    std::fs::write(output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    match DntConfig::from_file(path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Role: {}", config.role()?);
            println!("Tables: {}", config.tables.len());
            for (i, table) in config.tables.iter().enumerate() {
                let direction = match table.direction {
                    Direction::Publish => "publish",
                    Direction::Subscribe => "subscribe",
                };
                println!("  [{}] {} ({})", i, table.name, direction);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let args =
            Args::try_parse_from(["dnt-demo", "run", "--period-ms", "10", "-n", "3"]).unwrap();
        match args.command {
            Commands::Run {
                period_ms, count, ..
            } => {
                assert_eq!(period_ms, 10);
                assert_eq!(count, 3);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_config_publishes_demo_table() {
        let config = load_config(None).unwrap();
        assert_eq!(config.tables.len(), 1);
        assert_eq!(config.tables[0].name, "FromServer");
    }

    #[test]
    fn test_log_level_resolution() {
        let mut config = DntConfig::example();
        config.log_level = "debug".to_string();

        assert_eq!(resolve_log_level(Some("warn"), Some(&config)), "warn");
        assert_eq!(resolve_log_level(None, Some(&config)), "debug");
        assert_eq!(resolve_log_level(None, None), "info");
    }

    #[test]
    fn test_config_file_log_level_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dnt.toml");
        std::fs::write(
            &path,
            "log_level = \"trace\"\n[[tables]]\nname = \"t\"\ndirection = \"publish\"\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(resolve_log_level(None, Some(&config)), "trace");
    }

    #[test]
    fn test_sleep_returns_when_stopped() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        sleep_while_running(&running, Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
