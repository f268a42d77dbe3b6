use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use fixture_pipeline::config::YamlLoader;
use fixture_pipeline::logging;
use fixture_pipeline::managers::RunOptions;
use fixture_pipeline::processors::ProcessorRegistry;
use fixture_pipeline::spec::{Stage, WorkflowSpec};
use fixture_pipeline::store::Journal;
use fixture_pipeline::workflow::run_workflow;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "fixture-pipeline")]
#[command(about = "Versioned sports data pipeline", long_about = None)]
struct Cli {
    /// Directory of layer documents (*.yml, *.yaml).
    #[arg(long, global = true, env = "FIXTURE_PIPELINE_WORKFLOWS", default_value = "workflows")]
    workflows: PathBuf,

    /// Root that relative source and output paths are resolved against.
    #[arg(long, global = true, env = "FIXTURE_PIPELINE_REPO", default_value = ".")]
    repo: PathBuf,

    /// Debug logging (FIXTURE_PIPELINE_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow, layer by layer.
    Run {
        /// Only run this stage.
        #[arg(long, value_parser = parse_stage)]
        stage: Option<Stage>,

        /// Only run these models (repeatable).
        #[arg(long = "model")]
        models: Vec<String>,

        /// Include models with a manual trigger.
        #[arg(long)]
        manual: bool,

        /// Process without writing outputs or watermarks.
        #[arg(long)]
        dry_run: bool,

        /// Delete outputs and their watermarks before processing.
        #[arg(long)]
        reset: bool,
    },
    /// Load and check every layer document without running anything.
    Validate,
    /// Print the journal entry recorded for a data file.
    Journal { file: PathBuf },
}

fn parse_stage(s: &str) -> std::result::Result<Stage, String> {
    s.parse().map_err(|e: fixture_pipeline::PipelineError| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    });

    match cli.cmd {
        Commands::Run {
            stage,
            models,
            manual,
            dry_run,
            reset,
        } => {
            let registry = ProcessorRegistry::builtin();
            let workflow = load(&cli.workflows, &cli.repo, &registry)?;

            let selected: BTreeSet<String> = models.into_iter().collect();
            for name in &selected {
                let known = workflow
                    .layers()
                    .filter(|l| stage.is_none_or(|s| s == l.stage))
                    .any(|l| l.model(name).is_some());
                if !known {
                    bail!("unknown model '{}'", name);
                }
            }

            let options = RunOptions {
                manual,
                dry_run,
                reset,
            };
            let reports = run_workflow(&workflow, &registry, options, stage, &selected)?;

            let mut failed = Vec::new();
            for (stage, report) in &reports {
                for (model, err) in &report.failed {
                    failed.push(format!("{}.{}: {}", stage, model, err));
                }
            }
            if !failed.is_empty() {
                bail!("{} model(s) failed:\n  {}", failed.len(), failed.join("\n  "));
            }
        }
        Commands::Validate => {
            let registry = ProcessorRegistry::builtin();
            let workflow = load(&cli.workflows, &cli.repo, &registry)?;
            for layer in workflow.layers() {
                println!("{} ({}): {} models", layer.name, layer.stage, layer.models.len());
            }
        }
        Commands::Journal { file } => {
            let journal = Journal::for_file(&file)?;
            match journal.last_write()? {
                Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                None => println!("no journal entry for {}", file.display()),
            }
        }
    }

    Ok(())
}

fn load(dir: &Path, repo: &Path, registry: &ProcessorRegistry) -> Result<WorkflowSpec> {
    let workflow = YamlLoader::now()
        .load_workflow(dir, repo)
        .with_context(|| format!("load workflows from {}", dir.display()))?;
    workflow.check_processors(registry)?;
    info!("workflow valid");
    Ok(workflow)
}
