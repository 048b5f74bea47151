// PayNotify CLI
// Run single notifications, replay recorded ones, or inspect the rule table

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use paynotify::{
    load_events, AppConfig, ExtractionEngine, JsonLinesSink, NotificationPipeline, OcrDocument,
    RawEvent, RecoverySupervisor,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "paynotify")]
#[command(version, about = "Extract bank transfers from payment notifications", long_about = None)]
struct Cli {
    /// JSON config file (built-in Thai bank rules when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a single notification and print the outcome
    Extract {
        /// Source app identifier (e.g. com.scb.phone)
        #[arg(short, long)]
        source: String,

        #[arg(short, long, default_value = "")]
        title: String,

        #[arg(short, long)]
        body: String,
    },

    /// Run recorded notifications (source,title,body,posted_at_ms) through the pipeline
    Replay {
        /// CSV file with a header row
        csv: PathBuf,
    },

    /// Run a file of OCR text through the pipeline
    Ocr {
        /// Plain text file as produced by the recognizer
        text_file: PathBuf,
    },

    /// List configured extraction rules
    Rules,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { source, title, body } => run_extract(&config, source, title, body),
        Commands::Replay { csv } => run_replay(&config, csv),
        Commands::Ocr { text_file } => run_ocr(&config, text_file),
        Commands::Rules => run_rules(&config),
    }
}

// Logs go to stderr; stdout carries results
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paynotify=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Direct extraction: no source filter, no rate limit
fn run_extract(config: &AppConfig, source: String, title: String, body: String) -> Result<()> {
    let engine = ExtractionEngine::new(Arc::new(config.rule_table()?));
    let supervisor = RecoverySupervisor::new(engine);

    let event = RawEvent::new(source, title, body, Utc::now().timestamp_millis());
    let outcome = supervisor.extract(&event);

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Each event is judged at its own posted time, so windows replay faithfully
fn run_replay(config: &AppConfig, csv: PathBuf) -> Result<()> {
    let events = load_events(&csv)?;
    tracing::info!("📂 Loaded {} events from {:?}", events.len(), csv);

    let sink = JsonLinesSink::new(std::io::stdout());
    let pipeline = NotificationPipeline::from_config(config, Box::new(sink))?;

    for event in events {
        let now_ms = event.posted_at_ms;
        pipeline.handle_notification_at(event, now_ms);
    }

    tracing::info!("✓ {}", pipeline.stats().summary());
    Ok(())
}

fn run_ocr(config: &AppConfig, text_file: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&text_file)
        .with_context(|| format!("Failed to read OCR text: {:?}", text_file))?;

    let sink = JsonLinesSink::new(std::io::stdout());
    let pipeline = NotificationPipeline::from_config(config, Box::new(sink))?;

    let doc = OcrDocument::from_text(&text, Utc::now().timestamp_millis());
    let outcome = pipeline.handle_ocr(&doc);
    if !outcome.is_dispatched() {
        eprintln!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}

fn run_rules(config: &AppConfig) -> Result<()> {
    let table = config.rule_table()?;

    println!("🏷️  {} extraction rules (fingerprint {})", table.len(), &table.fingerprint()[..12]);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for rule in table.all_rules() {
        println!("{:<36} {}", rule.source().as_str(), rule.bank_name());
    }
    Ok(())
}
