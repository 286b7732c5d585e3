//! # Activity Configuration Checker
//!
//! Loads an activity configuration, compiles every binding and template, and
//! optionally prints resolved ops for the first cycles. Exits non-zero on any
//! construction-time error so broken workloads are caught before a run.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loadgen_core::activity::ActivityOps;
use loadgen_core::bindings::{BindingFunctionCompiler, MapperRegistry, WorkerContext};
use loadgen_core::config::ConfigManager;
use loadgen_core::logging::{log_activity_operation, log_binding_operation, log_error};
use std::path::PathBuf;
use std::process;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "loadgen-check")]
#[command(about = "Validate activity configuration and preview resolved ops")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment overlay to apply (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile every binding and template
    Check,

    /// Print resolved ops for the first cycles of the range
    Sample {
        /// Number of cycles to resolve
        #[arg(short = 'n', long, default_value_t = 5)]
        count: u64,
    },

    /// List registered mappers and their signatures
    Mappers,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Check) | None => check(&cli).map(|_| ()),
        Some(Commands::Sample { count }) => sample(&cli, *count),
        Some(Commands::Mappers) => list_mappers(&cli),
    };

    if let Err(e) = result {
        log_error("loadgen-check", "validate", &format!("{e:#}"), None);
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

fn check(cli: &Cli) -> Result<ActivityOps> {
    let manager =
        ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
            .context("loading activity configuration")?;
    let config = manager.config();
    log_activity_operation("check", &config.alias, "loaded", None, Some(&config.cycles));

    let compiler = BindingFunctionCompiler::default();
    for (name, recipe) in &config.bindings {
        let compiled = compiler
            .compile(recipe)
            .with_context(|| format!("compiling binding '{name}'"))?;
        log_binding_operation(
            "compile",
            name,
            recipe,
            "ok",
            Some(&compiled.output_type().to_string()),
        );
        if cli.format == "table" {
            println!(
                "✅ {name:<20} {:<8} {}{}",
                compiled.output_type(),
                recipe,
                if compiled.is_stateful() { "  (stateful)" } else { "" }
            );
        }
    }

    config.validate().context("validating activity settings")?;
    let ops = config
        .compile_ops(&compiler)
        .context("validating op templates")?;

    let range = config.cycle_range()?;
    info!(alias = %config.alias, cycles = %range, "Activity configuration is valid");
    if cli.format == "table" {
        println!();
        println!("Activity '{}': cycles {range}, threads {}", config.alias, config.threads);
        let sequence = ops.sequence();
        for (op, ratio) in sequence.ops().iter().zip(sequence.ratios()) {
            println!("  op {:<18} ratio {ratio}", op.name());
        }
        println!("  seq {} ({} slots)", sequence.sequencer(), sequence.len());
    }
    Ok(ops)
}

fn sample(cli: &Cli, count: u64) -> Result<()> {
    let ops = check(cli)?;
    let manager =
        ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)?;
    let range = manager.config().cycle_range()?;

    let binder = ops.binder()?;
    let mut ctx = WorkerContext::new(0);
    let end = range.end().unwrap_or(u64::MAX);
    for cycle in (range.start()..end).take(count as usize) {
        let op = binder.bind(cycle, &mut ctx);
        if cli.format == "json" {
            println!("{}", serde_json::to_string(&op)?);
        } else {
            println!("cycle {cycle} ({}):", op.name);
            for (field, value) in &op.fields {
                println!("  {field} = {value}");
            }
        }
    }
    Ok(())
}

fn list_mappers(cli: &Cli) -> Result<()> {
    let registry = MapperRegistry::standard();
    for name in registry.names() {
        for descriptor in registry.lookup(&name) {
            if cli.format == "json" {
                println!(
                    "{}",
                    serde_json::json!({
                        "name": descriptor.name,
                        "signature": descriptor.signature(),
                        "thread_safe": descriptor.thread_safe,
                        "stateful": descriptor.stateful,
                    })
                );
            } else {
                println!("{:<44} {}", descriptor.signature(), descriptor.summary);
            }
        }
    }
    Ok(())
}
