/*
 * crossfn: cross-function interaction analysis CLI
 *
 * Usage:
 *   crossfn analyze model.json --preset thorough --format json
 *   crossfn analyze model.yaml --config audit.yaml
 *   crossfn triage model.json --permissionless-only --limit 20
 *   crossfn validate model.json
 *
 * Logs go to stderr (RUST_LOG, default info); reports go to stdout.
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossfn_engine::config::{load_input, EngineConfig, Preset};
use crossfn_engine::features::dependency_graph::ModelValidator;
use crossfn_engine::features::triage::DEFAULT_TRIAGE_LIMIT;
use crossfn_engine::pipeline::AnalysisEngine;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crossfn")]
#[command(about = "Cross-function interaction analysis for smart-contract program models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every analysis and print the report
    Analyze {
        /// Program model input (.json, .yaml or .yml)
        model: PathBuf,

        /// YAML configuration file (preset + overrides)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Preset used when no configuration file is given
        #[arg(long, default_value = "balanced")]
        preset: Preset,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Exit with status 1 when any finding is reported
        #[arg(long, default_value_t = false)]
        fail_on_findings: bool,
    },

    /// Rank entry points by value-moving surface
    Triage {
        model: PathBuf,

        /// Only functions an attacker can call
        #[arg(long, default_value_t = false)]
        permissionless_only: bool,

        #[arg(long, default_value_t = DEFAULT_TRIAGE_LIMIT)]
        limit: usize,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check the model for dangling references without analyzing it
    Validate { model: PathBuf },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Analyze {
            model,
            config,
            preset,
            format,
            fail_on_findings,
        } => {
            let config = resolve_config(config.as_deref(), preset)?;
            let input = load_input(&model).with_context(|| format!("loading {}", model.display()))?;
            let engine = AnalysisEngine::new(config)?;
            let report = engine.run(&input)?;
            match format {
                OutputFormat::Json => println!("{}", report.to_json()?),
                OutputFormat::Text => print!("{}", report),
            }
            if fail_on_findings && !report.findings.is_empty() {
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Triage {
            model,
            permissionless_only,
            limit,
            format,
        } => {
            let input = load_input(&model).with_context(|| format!("loading {}", model.display()))?;
            let engine = AnalysisEngine::new(EngineConfig::default())?;
            let entries = engine.triage(&input, permissionless_only, limit)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
                OutputFormat::Text => {
                    for entry in &entries {
                        println!("{}", entry);
                    }
                }
            }
        }
        Commands::Validate { model } => {
            let input = load_input(&model).with_context(|| format!("loading {}", model.display()))?;
            ModelValidator::validate(&input)?;
            println!(
                "{}: {} contracts, {} functions, {} variables",
                model.display(),
                input.model.contracts.len(),
                input.model.functions().count(),
                input.model.variables().count()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn resolve_config(path: Option<&Path>, preset: Preset) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_yaml(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(EngineConfig::from_preset(preset)),
    }
}
