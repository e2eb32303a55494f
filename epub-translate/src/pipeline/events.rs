//! Progress notifications and run results reported to the front-end.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Extraction finished; `reusable` chunks already have checkpoint entries
    Started {
        documents: usize,
        total_chunks: usize,
        reusable: usize,
    },
    ChunkDone {
        document_id: String,
        chunk_index: usize,
        total_chunks: usize,
        /// Taken from the checkpoint store instead of translated
        reused: bool,
    },
    DocumentDone {
        document_id: String,
    },
    /// A partial EPUB reflecting all progress so far was written
    PartialWritten {
        path: PathBuf,
    },
    Error {
        kind: String,
        message: String,
    },
    Finished {
        output: PathBuf,
    },
    Stopped,
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every chunk is translated and the final output exists
    Finished { output: PathBuf },
    /// Stopped on request; progress is in the checkpoint and the partial file
    Stopped { partial: PathBuf },
}
