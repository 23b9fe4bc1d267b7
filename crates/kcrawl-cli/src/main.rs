//! KCrawl CLI - Command-line interface
//!
//! Usage:
//!   kcrawl run --roster entities.xlsx [--limit N] [--report run.json]
//!   kcrawl id <label>...
//!   kcrawl validate <file.json>...
//!
//! Author: hephaex@gmail.com

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kcrawl_core::{
    canonicalize, AppConfig, ConfigError, LlmProvider, LoggingConfig, SchemaValidator,
    SearchProvider,
};
use kcrawl_extractor::{CrawlRunner, JsonFileStore, PipelineOptions, PromptSet, StagePipeline};
use kcrawl_parser::FileRosterSource;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kcrawl")]
#[command(about = "Knowledge-graph entity record crawler")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build records for every roster entity
    Run {
        /// Roster file (.xlsx, .xls, .csv, .txt)
        #[arg(short, long)]
        roster: Option<PathBuf>,

        /// Process only the first N entities
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output directory for record files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Directory with prompt template overrides
        #[arg(long)]
        prompts: Option<PathBuf>,

        /// Text generation backend (openai, ollama, azure, simulated)
        #[arg(long)]
        llm: Option<LlmProvider>,

        /// Retrieval backend (searxng, corpus, simulated)
        #[arg(long)]
        search: Option<SearchProvider>,
    },
    /// Print the canonical identifier of each label
    Id {
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// Check record files against the record schema
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// `RUST_LOG` wins; a bare level applies to the kcrawl crates only
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.level.contains('=') {
            EnvFilter::new(&config.level)
        } else {
            EnvFilter::new(format!("kcrawl={}", config.level))
        }
    })
}

fn init_tracing(config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            roster,
            limit,
            output,
            report,
            prompts,
            llm,
            search,
        } => {
            // Flags override file and environment
            if roster.is_some() {
                config.pipeline.roster_path = roster;
            }
            if limit.is_some() {
                config.pipeline.limit = limit;
            }
            if let Some(dir) = output {
                config.output.dir = dir;
            }
            if report.is_some() {
                config.output.report_path = report;
            }
            if prompts.is_some() {
                config.pipeline.prompt_dir = prompts;
            }
            if let Some(provider) = llm {
                config.llm.provider = provider;
            }
            if let Some(provider) = search {
                config.search.provider = provider;
            }

            init_tracing(&config.logging);
            run(&config).await?;
        }
        Commands::Id { labels } => {
            for label in labels {
                println!("{}\t{}", label, canonicalize(&label));
            }
        }
        Commands::Validate { files } => {
            init_tracing(&config.logging);
            validate(&files)?;
        }
    }

    Ok(())
}

async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let roster_path = config
        .pipeline
        .roster_path
        .clone()
        .ok_or_else(|| {
            ConfigError::MissingRequired("roster path (--roster or ROSTER_PATH)".to_string())
        })?;

    let prompts = match &config.pipeline.prompt_dir {
        Some(dir) => PromptSet::with_overrides(dir)?,
        None => PromptSet::default(),
    };

    let generator = kcrawl_llm::create_text_generator(&config.llm)?;
    let retriever = kcrawl_search::create_retriever(&config.search)?;
    let store = Arc::new(JsonFileStore::new(&config.output.dir));
    tracing::info!(
        llm = generator.name(),
        search = retriever.name(),
        output = %config.output.dir.display(),
        "Collaborators ready"
    );

    let pipeline = StagePipeline::new(generator, retriever, store)
        .with_prompts(prompts)
        .with_options(PipelineOptions::from_config(&config.pipeline));
    let runner = CrawlRunner::new(pipeline).with_limit(config.pipeline.limit);

    let report = runner.run(&FileRosterSource::new(roster_path)).await?;

    println!("{}", report.summary());
    for failure in &report.failures {
        println!(
            "  aborted {} ({}) at {}: {}",
            failure.label, failure.entity_id, failure.failed_at, failure.reason
        );
    }
    for collision in &report.collisions {
        println!(
            "  id collision {}: '{}' and '{}'",
            collision.entity_id, collision.first_label, collision.label
        );
    }

    if let Some(path) = &config.output.report_path {
        report.write_json(path)?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn validate(files: &[PathBuf]) -> anyhow::Result<()> {
    let validator = SchemaValidator::new();
    let mut invalid = 0;

    for path in files {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;

        let report = validator.validate_value(&value);
        if report.is_valid() {
            println!("{}: ok", path.display());
        } else {
            invalid += 1;
            println!("{}: invalid", path.display());
            for violation in &report.violations {
                println!("  - {violation}");
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} of {} records failed validation", files.len());
    }
    Ok(())
}
