//! mnemobuddy - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use mnemobuddy::{
    cli::{Args, Commands},
    config::Config,
    doctor::Doctor,
    engine::MemoryEngine,
    ingest::{chunk_file, TextSplitter},
    llm,
    memory::ProceduralMemory,
    persist::FileResource,
    repl::{ChatLoop, DisplayManager, InputHandler},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate()?;

    match args.command() {
        Commands::Chat => run_chat(&args, config).await,
        Commands::Ingest { file, .. } => run_ingest(config, &file).await,
        Commands::Guidelines => show_guidelines(config).await,
        Commands::Recall { query } => run_recall(config, &query.join(" ")).await,
        Commands::Doctor => run_doctor(config).await,
        Commands::Config => show_config(&config),
    }
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.verbosity().log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_chat(args: &Args, config: Config) -> Result<()> {
    let history = config.store.data_dir.join("history");
    let engine = MemoryEngine::from_config(config).await?;

    let display = DisplayManager::new().quiet(args.quiet);
    display.show_banner(
        env!("CARGO_PKG_VERSION"),
        &engine.config().llm.model,
        engine.store().backend_name(),
    );

    let input = InputHandler::with_history("you> ", history)?;
    let mut orchestrator = engine.start_session().await;
    ChatLoop::new(input, display).run(&mut orchestrator).await
}

async fn run_ingest(config: Config, file: &std::path::Path) -> Result<()> {
    let splitter = TextSplitter::new(config.ingest.chunk_size, config.ingest.chunk_overlap)?;
    let chunks = chunk_file(file, &splitter)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let engine = MemoryEngine::from_config(config).await?;
    let report = engine.semantic().store_chunks(&chunks).await;

    println!(
        "{} {} chunks stored, {} failed",
        "ingest:".bold(),
        report.inserted.to_string().green(),
        report.failed.to_string().red()
    );
    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn show_guidelines(config: Config) -> Result<()> {
    let completion = llm::from_config(&config.llm)?;
    let resource = std::sync::Arc::new(FileResource::new(config.procedural_path()));
    let procedural = ProceduralMemory::new(resource, completion);
    println!("{}", procedural.read().await);
    Ok(())
}

async fn run_recall(config: Config, query: &str) -> Result<()> {
    let limit = config.retrieval.episodic_limit;
    let engine = MemoryEngine::from_config(config).await?;

    let matches = engine.episodic().recall_top(query, limit).await?;
    println!("{}", "Episodic matches".bold().cyan());
    if matches.is_empty() {
        println!("  (none)");
    }
    for record in &matches {
        println!("  [{}] {}", record.context_tags.join(", "), record.conversation_summary);
        println!("    worked: {}", record.what_worked);
        println!("    avoid:  {}", record.what_to_avoid);
    }

    let grounding = engine.semantic().recall(query).await?;
    println!("\n{}", "Semantic grounding".bold().cyan());
    if grounding.is_empty() {
        println!("  (none)");
    } else {
        println!("{}", grounding);
    }
    Ok(())
}

async fn run_doctor(config: Config) -> Result<()> {
    let engine = MemoryEngine::from_config(config).await?;
    let doctor = Doctor::new(engine.completion(), engine.embedder(), engine.store(), engine.guidelines());

    let checks = doctor.run_diagnostics().await;
    Doctor::display_results(&checks);
    std::process::exit(if Doctor::overall_status(&checks) { 0 } else { 1 });
}

fn show_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}
