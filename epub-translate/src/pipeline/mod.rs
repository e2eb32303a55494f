//! Resumable translation pipeline: extraction, chunking, checkpointed
//! translation and chapter-wise output.

mod events;
mod orchestrator;
mod state;

pub use events::{PipelineEvent, RunOutcome};
pub use orchestrator::Orchestrator;
pub use state::{PipelineState, RunState, StopToken};

use crate::config::{EpubTranslateConfig, OversizedPolicy};
use crate::error::Result;
use crate::lang;
use std::path::{Path, PathBuf};

/// Everything one run needs besides the transport and the checkpoint store.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Source EPUB, opened read-only
    pub input: PathBuf,
    /// Final output, written only once every chunk is translated
    pub output: PathBuf,
    /// Chapter-wise partial output, replaced after each document
    pub partial: PathBuf,
    pub source_lang: String,
    pub target_lang: String,
    /// Chunk budget in characters
    pub max_chunk_chars: usize,
    pub excluded_keywords: Vec<String>,
    pub oversized_policy: OversizedPolicy,
}

impl PipelineOptions {
    /// Options for translating `input` into `output` with `config`; languages
    /// are resolved to service codes.
    pub fn new(input: &Path, output: &Path, config: &EpubTranslateConfig) -> Result<Self> {
        Ok(Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            partial: partial_path(output),
            source_lang: lang::normalize_source(&config.source_lang)?,
            target_lang: lang::normalize_target(&config.target_lang)?,
            max_chunk_chars: config.transport.max_input_length,
            excluded_keywords: config.excluded_keywords.clone(),
            oversized_policy: config.oversized_policy,
        })
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string());
    path.with_file_name(format!("{}.{}", stem, suffix))
}

/// `<input-stem>.<target>.epub` beside the input.
pub fn default_output_path(input: &Path, target_lang: &str) -> PathBuf {
    sibling(input, &format!("{}.epub", target_lang))
}

/// `<output-stem>.partial.epub` beside the output.
pub fn partial_path(output: &Path) -> PathBuf {
    sibling(output, "partial.epub")
}

/// `<output-stem>.checkpoint.jsonl` beside the output.
pub fn checkpoint_path(output: &Path) -> PathBuf {
    sibling(output, "checkpoint.jsonl")
}
