//! slk entry point.
//!
//! This binary is intentionally thin: it sets up tracing, loads the
//! layered config, resolves secrets, wires the gateway / store / notifier
//! into the engine, and hands the parsed event over. All reconciliation
//! policy lives in `slk-reconcile`.

use std::fs;
use std::io::Read;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value;
use slk_config::secrets::resolve_secrets;
use slk_config::{load_layered_yaml, LoadedConfig};
use slk_gateway::{HttpAccessGateway, HttpLockTransport};
use slk_notify::LogNotifier;
use slk_reconcile::ReconcileEngine;
use slk_store::{BookingStore, JsonFileStore, MemoryStore};
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "slk")]
#[command(about = "StayLock access-code sync CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one event document: a booking object, an array of booking
    /// objects, or a cleanup trigger.
    Process {
        /// Layered config paths in merge order (base -> site -> overrides)
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Event JSON path, or '-' for stdin
        #[arg(long)]
        input: String,

        /// Directory for the JSON-file idempotency store; omitted runs
        /// with the in-memory store (no cross-invocation memory)
        #[arg(long)]
        store_dir: Option<String>,
    },

    /// Force the cleanup sweep for every mapped device.
    Cleanup {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Report what would be deleted without issuing deletes
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Compute the layered config hash + print canonical JSON.
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file
    // does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let invocation_id = Uuid::new_v4();
    let span = tracing::info_span!("invocation", id = %invocation_id);
    let _guard = span.enter();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Process {
            config_paths,
            input,
            store_dir,
        } => cmd_process(&config_paths, &input, store_dir.as_deref()),
        Commands::Cleanup {
            config_paths,
            dry_run,
        } => cmd_cleanup(&config_paths, dry_run),
        Commands::ConfigHash { paths } => cmd_config_hash(&paths),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(config_paths: &[String]) -> Result<LoadedConfig> {
    let paths: Vec<&str> = config_paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&paths)?;
    info!(config_hash = %loaded.config_hash, "config loaded");
    Ok(loaded)
}

fn build_engine(loaded: LoadedConfig, store_dir: Option<&str>) -> Result<ReconcileEngine> {
    let secrets = resolve_secrets(&loaded.config)?;
    let transport = HttpLockTransport::new(loaded.config.lock_api_base(), &secrets.lock_api_key)
        .context("building http transport failed")?;
    let gateway = HttpAccessGateway::new(
        Box::new(transport),
        loaded.config.matching.duplicate_is_success,
    );

    let store: Box<dyn BookingStore> = match store_dir {
        Some(dir) => Box::new(JsonFileStore::new(dir).context("opening store dir failed")?),
        None => Box::new(MemoryStore::new()),
    };

    Ok(ReconcileEngine::new(
        loaded.config,
        Box::new(gateway),
        store,
        Box::new(LogNotifier),
    ))
}

fn read_input(input: &str) -> Result<Value> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin failed")?;
        buf
    } else {
        fs::read_to_string(input).with_context(|| format!("failed to read input: {input}"))?
    };
    serde_json::from_str(&raw).context("input is not valid JSON")
}

fn cmd_process(config_paths: &[String], input: &str, store_dir: Option<&str>) -> Result<()> {
    let loaded = load_config(config_paths)?;
    let payload = read_input(input)?;
    let engine = build_engine(loaded, store_dir)?;

    let outcome = engine.process_value(&payload, Utc::now());
    println!("{}", serde_json::to_string_pretty(&outcome.to_json())?);

    if !outcome.is_fully_accepted() {
        bail!("one or more events were not accepted");
    }
    Ok(())
}

fn cmd_cleanup(config_paths: &[String], dry_run: bool) -> Result<()> {
    let mut loaded = load_config(config_paths)?;
    if dry_run {
        loaded.config.cleanup.dry_run = true;
    }
    let engine = build_engine(loaded, None)?;

    let outcome = engine.cleanup_sweep(Utc::now());
    println!("{}", serde_json::to_string_pretty(&serde_json::to_value(&outcome)?)?);
    Ok(())
}

fn cmd_config_hash(paths: &[String]) -> Result<()> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    println!("config_hash: {}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}
