use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use service_lifecycle::config::{load_config, LifecycleConfig};
use service_lifecycle::lifecycle::{shutdown_on_ctrl_c, ParallelInitializer};
use service_lifecycle::observability::logging::init_logging;
use service_lifecycle::simulation::build_registry;
use service_lifecycle::{DependencyResolver, LifecycleError};

#[derive(Parser)]
#[command(name = "lifecycle-cli")]
#[command(about = "Plan, check and rehearse service start-up order", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the layered init order
    Plan {
        config: PathBuf,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
        /// Leave a service out of this run (repeatable)
        #[arg(long = "disable", value_name = "NAME")]
        disabled: Vec<String>,
    },
    /// Report missing dependencies and cycles
    Check { config: PathBuf },
    /// Rehearse a full init and close with simulated services
    Simulate {
        config: PathBuf,
        /// Leave a service out of this run (repeatable)
        #[arg(long = "disable", value_name = "NAME")]
        disabled: Vec<String>,
    },
}

#[derive(Serialize)]
struct Plan {
    layers: Vec<Vec<String>>,
    missing: BTreeMap<String, Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            config,
            json,
            disabled,
        } => {
            let config = load(&config, disabled)?;
            let resolver = DependencyResolver::from_nodes(config.enabled_nodes());
            let plan = Plan {
                missing: resolver.validate_dependencies(),
                layers: resolver.resolve()?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print_plan(&plan);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { config } => {
            let config = load(&config, Vec::new())?;
            let resolver = DependencyResolver::from_nodes(config.enabled_nodes());

            for (service, missing) in resolver.validate_dependencies() {
                println!("warning: '{}' depends on unknown {:?}", service, missing);
            }
            match resolver.detect_cycle() {
                Ok(()) => {
                    println!("ok: {} services, no cycles", resolver.len());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Simulate { config, disabled } => {
            let config = load(&config, disabled)?;
            simulate(config).await
        }
    }
}

fn load(path: &Path, disabled: Vec<String>) -> Result<LifecycleConfig, Box<dyn std::error::Error>> {
    let mut config = load_config(path)?;
    init_logging(&config.observability)?;
    config.disabled.extend(disabled);
    Ok(config)
}

fn print_plan(plan: &Plan) {
    for (service, missing) in &plan.missing {
        println!("warning: '{}' depends on unknown {:?}", service, missing);
    }
    for (index, layer) in plan.layers.iter().enumerate() {
        println!("layer {}: {}", index, layer.join(", "));
    }
}

async fn simulate(config: LifecycleConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let registry = Arc::new(build_registry(&config)?);
    let initializer = ParallelInitializer::new(Arc::clone(&registry), config.initializer.clone());

    let root = CancellationToken::new();
    let listener = shutdown_on_ctrl_c(root.clone());

    let started = Instant::now();
    let init_result = initializer.init(&root, &config).await;
    if let Err(e) = &init_result {
        eprintln!("init failed: {}", e);
        if let LifecycleError::LayerFailed { source, .. } = e {
            eprintln!("  cause: {}", source.root_cause());
        }
    }
    let init_elapsed = started.elapsed();

    let close_result = initializer.close(&root, &config).await;
    if let Err(e) = &close_result {
        eprintln!("close failed: {}", e);
    }
    root.cancel();
    let _ = listener.await;

    for (name, state) in registry.states() {
        println!("{:<24} {}", name, state);
    }
    let stats = initializer.stats();
    println!(
        "init took {}ms: {} attempts, {} retries, {} timeouts, {} late results",
        init_elapsed.as_millis(),
        stats.attempts,
        stats.retries,
        stats.timeouts,
        stats.late_results
    );

    if init_result.is_err() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
