// crates/wavecli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wavecore::{
    CompareOp, ConditionExpr, ExecutionEvent, ParameterMap, ProducerDefinition, RelationDefinition,
    RunOptions, Value, WorkflowDefinition,
};
use waveruntime::{RuntimeConfig, WaveRuntime, WorkflowManager};

#[derive(Parser)]
#[command(name = "wave")]
#[command(about = "Wave workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow definition file
    Run {
        /// Path to a definition JSON file (one definition or an array)
        #[arg(short, long)]
        file: PathBuf,

        /// Input as a JSON array (any JSON value with --single-input)
        #[arg(short, long)]
        input: Option<String>,

        /// Environment as a JSON object
        #[arg(short, long)]
        env: Option<String>,

        /// Hand the input to the entrance as one value
        #[arg(long)]
        single_input: bool,

        /// Keep only the last result
        #[arg(long)]
        return_last: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Load a definition file without running it
    Validate {
        /// Path to a definition JSON file
        file: PathBuf,
    },

    /// List available producer types
    Producers,

    /// Create a new example definition
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            env,
            single_input,
            return_last,
            verbose,
        } => {
            init_tracing(verbose);
            let options = RunOptions::new()
                .single_input(single_input)
                .return_last(return_last);
            run_workflow(&file, input, env, options).await?;
        }

        Commands::Validate { file } => {
            init_tracing(false);
            validate_workflow(&file)?;
        }

        Commands::Producers => {
            list_producers();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn read_definitions(file: &Path) -> Result<Vec<WorkflowDefinition>> {
    let json = std::fs::read_to_string(file).with_context(|| format!("Cannot read {}", file.display()))?;
    let definitions = WorkflowDefinition::list_from_json(&json)?;
    tracing::debug!("Loaded {} definition(s) from {}", definitions.len(), file.display());
    Ok(definitions)
}

fn parse_environment(env: Option<String>) -> Result<ParameterMap> {
    let Some(raw) = env else {
        return Ok(ParameterMap::new());
    };
    match Value::from(serde_json::from_str::<serde_json::Value>(&raw)?) {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow::anyhow!("Environment must be a JSON object")),
    }
}

async fn run_workflow(
    file: &Path,
    input: Option<String>,
    env: Option<String>,
    options: RunOptions,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());
    let definitions = read_definitions(file)?;

    let input = match input {
        Some(raw) => Value::from(serde_json::from_str::<serde_json::Value>(&raw)?),
        None => Value::Array(Vec::new()),
    };
    let environment = parse_environment(env)?;

    let config = RuntimeConfig {
        default_options: options,
        ..RuntimeConfig::default()
    };
    let runtime = WaveRuntime::with_registry(wavenodes::standard_registry(), config);

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted { entrance, .. } => {
                    println!("▶️  Workflow started at {}", entrance);
                }
                ExecutionEvent::WaveStarted { wave, producers, .. } => {
                    println!("  🌊 Wave {}: {}", wave, producers.join(", "));
                }
                ExecutionEvent::ProducerCompleted {
                    producer_id,
                    producer_type,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ {} ({}) completed in {}ms", producer_id, producer_type, duration_ms);
                }
                ExecutionEvent::ProducerSkipped { producer_id, .. } => {
                    println!("  ⏭️  {} skipped", producer_id);
                }
                ExecutionEvent::WorkflowPaused { .. } => println!("⏸️  Workflow paused"),
                ExecutionEvent::WorkflowResumed { .. } => println!("▶️  Workflow resumed"),
                ExecutionEvent::WorkflowStopped { .. } => println!("⏹️  Workflow stopped"),
                ExecutionEvent::WorkflowCompleted {
                    finished,
                    duration_ms,
                    ..
                } => {
                    if finished {
                        println!("✨ Workflow completed in {}ms", duration_ms);
                    } else {
                        println!("⏹️  Workflow ended early after {}ms", duration_ms);
                    }
                }
                ExecutionEvent::WorkflowFailed { error, .. } => {
                    println!("💥 Workflow failed: {}", error);
                }
            }
        }
    });

    let result = runtime.run_definition(&definitions, input, environment).await;
    // Dropping the runtime closes the bus, so the listener drains and exits
    drop(runtime);
    let _ = event_task.await;
    let result = result?;

    println!();
    println!("📤 Result:");
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let definitions = read_definitions(file)?;
    let registry = wavenodes::standard_registry();
    let manager = WorkflowManager::from_definitions(registry.as_ref(), &definitions)?;

    println!("✅ Workflow is valid:");
    println!("   Producers: {}", manager.graph().len());
    println!("   Entrance: {}", manager.entrance().unwrap_or("-"));
    println!("   Output: {}", manager.output().unwrap_or("-"));

    let unreachable = manager.unreachable_nodes();
    if !unreachable.is_empty() {
        println!("⚠️  Never reached from the entrance: {}", unreachable.join(", "));
    }

    Ok(())
}

fn list_producers() {
    println!("📦 Available Producer Types:");
    println!();

    let registry = wavenodes::standard_registry();

    for producer_type in registry.list_producer_types() {
        if let Some(metadata) = registry.get_metadata(&producer_type) {
            println!("  • {} ({})", producer_type, metadata.category);
            println!("    {}", metadata.description);
            for spec in metadata.parameters.iter() {
                let flag = if spec.optional { "optional" } else { "required" };
                println!("      - {}: {} ({}) {}", spec.name, spec.kind, flag, spec.description);
            }
        } else {
            println!("  • {}", producer_type);
        }
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let definition = WorkflowDefinition::new()
        .producer(ProducerDefinition::new("data_pick", "pick").param("query", "/score"))
        .producer(
            ProducerDefinition::new("value_convert", "grade").param(
                "rules",
                Value::from(serde_json::json!([
                    {"key": 100, "value": "perfect"},
                    {"default": true, "value": "passed"}
                ])),
            ),
        )
        .producer(ProducerDefinition::new("log", "report").param("message", "graded"))
        .relation(
            RelationDefinition::new("pick", "grade")
                .condition(ConditionExpr::compare("", CompareOp::Ge, 60)),
        )
        .relation(RelationDefinition::new("grade", "report"))
        .entrance("pick")
        .output("report");

    let json = serde_json::to_string_pretty(&definition)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  wave run --file {} --input '[{{\"score\": 100}}, {{\"score\": 75}}, {{\"score\": 20}}]'",
        output.display()
    );

    Ok(())
}
