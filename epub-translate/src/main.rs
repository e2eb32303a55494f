//! epub-translate - Translate EPUB books through a paced, browser-driven translation service

mod checkpoint;
mod config;
mod epub;
mod error;
mod lang;
mod pipeline;
mod text;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use checkpoint::CheckpointStore;
use clap::{Parser, Subcommand};
use config::{EpubTranslateConfig, OversizedPolicy};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use pipeline::{Orchestrator, PipelineEvent, PipelineOptions, RunOutcome, StopToken};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use translate_client::{HttpBridgeTranslator, PacedTranslator};

#[derive(Parser, Debug)]
#[command(name = "epub-translate")]
#[command(about = "Translate EPUB books chapter by chapter, resuming where the last run stopped", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the EPUB file
    input: Option<PathBuf>,

    /// Output file path (default: <epub-name>.<target>.epub)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source language name or code ("auto" to detect)
    #[arg(long)]
    source: Option<String>,

    /// Target language name or code
    #[arg(long)]
    target: Option<String>,

    /// Checkpoint file (default: <output-name>.checkpoint.jsonl)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// URL of the translation bridge
    #[arg(long)]
    bridge_url: Option<String>,

    /// Maximum characters per request
    #[arg(long)]
    max_input: Option<usize>,

    /// What to do with a paragraph longer than --max-input
    #[arg(long, value_enum)]
    oversized: Option<OversizedPolicy>,

    /// Discard the existing checkpoint and translate everything again
    #[arg(long)]
    fresh: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show documents, segments and chunk ids without translating
    Plan {
        /// Path to the EPUB file
        input: PathBuf,
    },
    /// Inspect or wipe a checkpoint file
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum CheckpointAction {
    /// Show how many chunks of each document are stored
    Status {
        /// Path to the checkpoint file
        path: PathBuf,
    },
    /// Remove all entries so the next run translates everything again
    Clear {
        /// Path to the checkpoint file
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the translation bridge URL
    SetBridgeUrl {
        /// e.g. http://127.0.0.1:9515/translate
        url: String,
    },
    /// Set default source and target languages
    SetLanguages {
        /// Source language ("auto" to detect)
        source: String,
        /// Target language
        target: String,
    },
    /// Set the pause between requests
    SetCooldown {
        /// Seconds
        seconds: f64,
    },
    /// Set attempts per request
    SetRetries {
        /// At least 1
        attempts: u32,
    },
    /// Leave documents whose path contains this keyword untranslated
    AddExcluded {
        keyword: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    match &args.command {
        Some(Commands::Plan { input }) => return handle_plan(input, &args),
        Some(Commands::Checkpoint { action }) => return handle_checkpoint_command(action),
        Some(Commands::Config { action }) => return handle_config_command(action),
        None => {}
    }

    translate(&args).await
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Command-line flags take precedence over the config file for this run.
fn apply_overrides(config: &mut EpubTranslateConfig, args: &Args) {
    if let Some(source) = &args.source {
        config.source_lang = source.clone();
    }
    if let Some(target) = &args.target {
        config.target_lang = target.clone();
    }
    if let Some(url) = &args.bridge_url {
        config.transport.bridge_url = Some(url.clone());
    }
    if let Some(max) = args.max_input {
        config.transport.max_input_length = max;
    }
    if let Some(policy) = args.oversized {
        config.oversized_policy = policy;
    }
}

fn load_config(args: &Args) -> Result<EpubTranslateConfig> {
    let mut config = EpubTranslateConfig::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, args);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn translate(args: &Args) -> Result<()> {
    let input = args.input.clone().ok_or_else(|| {
        anyhow::anyhow!("EPUB file path is required. Run 'epub-translate --help' for usage.")
    })?;
    if !input.exists() {
        anyhow::bail!("EPUB file not found: {}", input.display());
    }

    let config = load_config(args)?;
    let target = lang::normalize_target(&config.target_lang)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| pipeline::default_output_path(&input, &target));
    if output == input {
        anyhow::bail!("Output path must differ from the input file");
    }
    let checkpoint_path = args
        .checkpoint
        .clone()
        .unwrap_or_else(|| pipeline::checkpoint_path(&output));

    let options = PipelineOptions::new(&input, &output, &config)?;
    debug!("Options: {:?}", options);

    let mut store = CheckpointStore::open(&checkpoint_path)
        .with_context(|| format!("Failed to open checkpoint {}", checkpoint_path.display()))?;
    if args.fresh && !store.is_empty() {
        info!("Discarding {} checkpoint entries", store.len());
        store.clear()?;
    } else if !store.is_empty() {
        eprintln!(
            "Resuming: {} chunks already translated in {}",
            store.len(),
            checkpoint_path.display()
        );
    }

    let bridge = HttpBridgeTranslator::from_config(&config.transport)?;
    let translator = PacedTranslator::new(bridge, config.transport.clone())?;

    eprintln!(
        "Translating {} ({} -> {})",
        input.display(),
        language_label(&options.source_lang),
        language_label(&options.target_lang)
    );

    let stop = StopToken::new();
    watch_for_interrupt(stop.clone());

    let partial = options.partial.clone();
    let mut orchestrator = Orchestrator::new(options, translator, store, stop);

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let result = orchestrator
        .run(|event| report_progress(&progress, event))
        .await;
    progress.finish_and_clear();

    match result {
        Ok(RunOutcome::Finished { output }) => {
            eprintln!("Translated book written to {}", output.display());
            eprintln!(
                "Checkpoint kept at {}; clear it to force retranslation.",
                checkpoint_path.display()
            );
            Ok(())
        }
        Ok(RunOutcome::Stopped { partial }) => {
            let run = orchestrator.run_state();
            eprintln!(
                "Stopped by user before document {}, chunk {}.",
                run.document_index + 1,
                run.chunk_index + 1
            );
            print_resume_hint(&checkpoint_path, &partial);
            Ok(())
        }
        Err(e) => {
            eprintln!("Aborted by error: {}", e);
            if matches!(e, error::Error::QuotaExceeded { .. }) {
                eprintln!("The service's usage limit was reached; try again later.");
            }
            print_resume_hint(&checkpoint_path, &partial);
            Err(e.into())
        }
    }
}

fn language_label(code: &str) -> String {
    match lang::display_name(code) {
        Some(name) => format!("{} ({})", name, code),
        None => code.to_string(),
    }
}

/// First Ctrl-C stops after the current chunk; a second one exits at once.
fn watch_for_interrupt(stop: StopToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Stop requested; finishing the current chunk (Ctrl-C again to quit now)");
        stop.request();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

fn report_progress(progress: &ProgressBar, event: PipelineEvent) {
    match event {
        PipelineEvent::Started {
            documents,
            total_chunks,
            reusable,
        } => {
            progress.set_length(total_chunks as u64);
            progress.println(format!(
                "{} documents, {} chunks ({} from checkpoint)",
                documents, total_chunks, reusable
            ));
        }
        PipelineEvent::ChunkDone { document_id, .. } => {
            progress.inc(1);
            progress.set_message(document_id);
        }
        PipelineEvent::DocumentDone { document_id } => {
            debug!("Finished {}", document_id);
        }
        PipelineEvent::PartialWritten { path } => {
            debug!("Partial output updated: {}", path.display());
        }
        PipelineEvent::Error { kind, message } => {
            progress.println(format!("error ({}): {}", kind, message));
        }
        PipelineEvent::Finished { .. } | PipelineEvent::Stopped => {}
    }
}

fn print_resume_hint(checkpoint: &Path, partial: &Path) {
    eprintln!("  Checkpoint:     {}", checkpoint.display());
    if partial.exists() {
        eprintln!("  Partial output: {}", partial.display());
    }
    eprintln!("Run the same command again to resume.");
}

fn handle_plan(input: &Path, args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let extractor = epub::Extractor::open(input, &config.excluded_keywords)?;
    let title = extractor.title().map(str::to_string);
    let documents = extractor.collect::<error::Result<Vec<_>>>()?;

    println!("{}", title.as_deref().unwrap_or("(untitled)"));
    println!("Chunk budget: {} characters", config.transport.max_input_length);
    println!();

    let mut total_chunks = 0;
    for document in &documents {
        if !document.included {
            println!("{}  excluded", document.id);
            continue;
        }
        if let Some(reason) = &document.parse_error {
            println!("{}  passed through ({})", document.id, reason);
            continue;
        }

        let chunks = text::build_chunks(
            &document.id,
            &document.segments,
            config.transport.max_input_length,
        );
        total_chunks += chunks.len();
        println!(
            "{}  {} segments, {} characters, {} chunks",
            document.id,
            document.segments.len(),
            document.char_len(),
            chunks.len()
        );
        for chunk in &chunks {
            let marker = if chunk.char_len() > config.transport.max_input_length {
                "  oversized"
            } else {
                ""
            };
            println!(
                "    {}  {} segments, {} chars{}",
                chunk.id,
                chunk.segment_count(),
                chunk.char_len(),
                marker
            );
        }
    }

    println!();
    println!("{} documents, {} chunks", documents.len(), total_chunks);
    Ok(())
}

/// Stored chunk counts per document id.
fn entries_per_document(store: &CheckpointStore) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in store.entries() {
        let document = entry
            .id
            .rsplit_once('#')
            .map(|(doc, _)| doc)
            .unwrap_or(&entry.id);
        *counts.entry(document.to_string()).or_insert(0) += 1;
    }
    counts
}

fn handle_checkpoint_command(action: &CheckpointAction) -> Result<()> {
    match action {
        CheckpointAction::Status { path } => {
            if !path.exists() {
                println!("No checkpoint at {}", path.display());
                return Ok(());
            }
            let store = CheckpointStore::open(path)?;
            println!("Checkpoint: {}", path.display());
            println!("Entries: {}", store.len());
            for (document, count) in entries_per_document(&store) {
                println!("  {}  {}", document, count);
            }
            if let Some(latest) = store.entries().iter().map(|e| e.at).max() {
                println!("Last update: {}", latest.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        CheckpointAction::Clear { path } => {
            if !path.exists() {
                println!("No checkpoint at {}", path.display());
                return Ok(());
            }
            let mut store = CheckpointStore::open(path)?;
            let removed = store.len();
            store.clear()?;
            println!("Removed {} entries from {}", removed, path.display());
        }
    }
    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    let mut config = EpubTranslateConfig::load()?;
    match action {
        ConfigAction::Show => {
            println!("Configuration file: {:?}", EpubTranslateConfig::config_path()?);
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            println!();
            let languages: Vec<String> = lang::supported()
                .iter()
                .map(|(name, code)| format!("{} ({})", name, code))
                .collect();
            println!("Supported languages: {}", languages.join(", "));
            return Ok(());
        }
        ConfigAction::SetBridgeUrl { url } => {
            config.transport.bridge_url = Some(url.clone());
            println!("Bridge URL set to: {}", url);
        }
        ConfigAction::SetLanguages { source, target } => {
            let source_code = lang::normalize_source(source)?;
            let target_code = lang::normalize_target(target)?;
            config.source_lang = source.clone();
            config.target_lang = target.clone();
            println!("Languages set to: {} -> {}", source_code, target_code);
        }
        ConfigAction::SetCooldown { seconds } => {
            config.transport.cooldown_seconds = *seconds;
            println!("Cooldown set to: {}s", seconds);
        }
        ConfigAction::SetRetries { attempts } => {
            config.transport.retry_attempts = *attempts;
            println!("Retry attempts set to: {}", attempts);
        }
        ConfigAction::AddExcluded { keyword } => {
            let keyword = keyword.trim().to_lowercase();
            if keyword.is_empty() {
                anyhow::bail!("Keyword must not be empty");
            }
            if config.excluded_keywords.contains(&keyword) {
                println!("'{}' is already excluded", keyword);
                return Ok(());
            }
            config.excluded_keywords.push(keyword.clone());
            println!("Documents matching '{}' will be left untranslated", keyword);
        }
    }
    config.validate().context("Refusing to save invalid configuration")?;
    config.save()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "epub-translate",
            "book.epub",
            "--target",
            "German",
            "--max-input",
            "3000",
            "--oversized",
            "reject",
            "--bridge-url",
            "http://127.0.0.1:9515/translate",
        ]);
        let mut config = EpubTranslateConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.source_lang, "auto");
        assert_eq!(config.target_lang, "German");
        assert_eq!(config.transport.max_input_length, 3000);
        assert_eq!(config.oversized_policy, OversizedPolicy::Reject);
        assert_eq!(
            config.transport.bridge_url.as_deref(),
            Some("http://127.0.0.1:9515/translate")
        );
    }

    #[test]
    fn test_subcommands_parse() {
        let args = Args::parse_from(["epub-translate", "checkpoint", "clear", "book.checkpoint.jsonl"]);
        assert!(matches!(
            args.command,
            Some(Commands::Checkpoint {
                action: CheckpointAction::Clear { .. }
            })
        ));

        let args = Args::parse_from(["epub-translate", "config", "set-languages", "ko", "en"]);
        assert!(matches!(
            args.command,
            Some(Commands::Config {
                action: ConfigAction::SetLanguages { .. }
            })
        ));
    }

    #[test]
    fn test_entries_per_document() {
        let dir = TempDir::new().unwrap();
        let mut store = CheckpointStore::open(&dir.path().join("book.checkpoint.jsonl")).unwrap();
        store.put("OEBPS/ch1.xhtml#0", "a", "A").unwrap();
        store.put("OEBPS/ch1.xhtml#12", "b", "B").unwrap();
        store.put("OEBPS/ch2.xhtml#0", "c", "C").unwrap();

        let counts = entries_per_document(&store);
        assert_eq!(counts.get("OEBPS/ch1.xhtml"), Some(&2));
        assert_eq!(counts.get("OEBPS/ch2.xhtml"), Some(&1));
    }
}
