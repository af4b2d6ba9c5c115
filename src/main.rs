//! clausewatch: command-line entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI, load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Dispatch the subcommand (`watch` by default)

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use clausewatch::agent::RiskLevel;
use clausewatch::config::{self, Config};
use clausewatch::error::AppError;
use clausewatch::logger;
use clausewatch::pipeline::{Pipeline, ProcessOutcome};
use clausewatch::report;
use clausewatch::store::analysis::AnalysisStore;
use clausewatch::store::chunks::ChunkStore;
use clausewatch::watcher::DirectoryWatcher;

#[derive(Debug, Parser)]
#[command(name = "clausewatch", version, about = "Contract watcher and clause risk analyser")]
struct Cli {
    /// Config file (default: config/default.toml).
    #[arg(short = 'f', long = "config", global = true, value_name = "PATH")]
    config: Option<String>,

    /// Raise log verbosity (-v warn, -vv info, -vvv debug, -vvvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch the uploads directory until Ctrl-C.
    Watch,
    /// Analyse the given files now.
    Process {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
        /// Copy each file into the uploads directory first.
        #[arg(long)]
        copy: bool,
        /// Re-analyse even if the content is unchanged.
        #[arg(long)]
        force: bool,
    },
    /// List stored analyses.
    List,
    /// Show one analysis.
    Show {
        /// Document id (`nda.pdf`) or file name (`nda.pdf.json`).
        name: String,
        /// Keep clauses whose name or text contains this keyword.
        #[arg(long)]
        search: Option<String>,
        /// Keep clauses at these risk levels (repeatable).
        #[arg(long = "risk", value_name = "LEVEL")]
        risks: Vec<RiskLevel>,
    },
    /// Full-text search over indexed chunks.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, AppError> {
    // Load .env if present: ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    let cli_level = logger::level_for_verbosity(cli.verbose);
    let effective_log_level = cli_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, cli_level.is_some(), config.log_file.as_deref())?;

    info!(
        work_dir = %config.work_dir.display(),
        provider = %config.llm.provider,
        model = %config.llm.active_model(),
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(&config).await,
        Command::Process { files, copy, force } => process(&config, &files, copy, force).await,
        Command::List => list(&config),
        Command::Show { name, search, risks } => show(&config, &name, search.as_deref(), &risks),
        Command::Search { query, top_k } => search(&config, &query, top_k),
    }
}

async fn watch(config: &Config) -> Result<ExitCode, AppError> {
    let pipeline = Pipeline::from_config(config)?;

    // Shared shutdown token: Ctrl-C cancels it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received: shutting down");
            ctrlc_token.cancel();
        }
    });

    let watcher = DirectoryWatcher::new(pipeline, &config.watcher);
    println!("Watching {} for new contracts...", watcher.uploads_dir().display());
    watcher.run(shutdown).await?;
    Ok(ExitCode::SUCCESS)
}

async fn process(config: &Config, files: &[PathBuf], copy: bool, force: bool) -> Result<ExitCode, AppError> {
    let pipeline = Pipeline::from_config(config)?.with_force(force);
    let stage_into = copy.then_some(config.watcher.uploads_dir.as_path());

    let report = pipeline.process_batch(files, stage_into).await;
    for item in &report.items {
        match &item.result {
            Ok(ProcessOutcome::Analyzed { output, .. }) => {
                println!("✅ {} analyzed successfully ({})", item.name, output.display());
            }
            Ok(ProcessOutcome::Unchanged { output }) => {
                println!("✅ {} unchanged ({})", item.name, output.display());
            }
            Err(e) => println!("❌ {} failed: {e}", item.name),
        }
    }

    Ok(if report.all_succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn list(config: &Config) -> Result<ExitCode, AppError> {
    let store = AnalysisStore::open(&config.analysis.output_dir)?;
    print!("{}", report::render_listing(&report::load_listing(&store)?));
    Ok(ExitCode::SUCCESS)
}

fn show(config: &Config, name: &str, search: Option<&str>, risks: &[RiskLevel]) -> Result<ExitCode, AppError> {
    let store = AnalysisStore::open(&config.analysis.output_dir)?;
    let analysis = store.load(name)?;
    let clauses = report::filter_clauses(&analysis, search, risks);
    print!("{}", report::render_analysis(&analysis, &clauses));
    Ok(ExitCode::SUCCESS)
}

fn search(config: &Config, query: &str, top_k: usize) -> Result<ExitCode, AppError> {
    let store = ChunkStore::open(&config.store.dir, config.store.chunk_size, config.store.chunk_overlap)?;
    let hits = store.search(query, top_k)?;
    if hits.is_empty() {
        println!("No matches.");
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{}] @{} (score {:.3})", i + 1, hit.doc_id, hit.position, hit.score);
        println!("   {}", hit.text.replace('\n', " "));
    }
    Ok(ExitCode::SUCCESS)
}
