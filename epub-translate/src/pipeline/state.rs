//! Run state of one pipeline invocation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    RunningDocument,
    RunningChunk,
    /// A stop was observed at a chunk boundary; final for a user stop
    Stopping,
    Finished,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RunningDocument => "running document",
            Self::RunningChunk => "running chunk",
            Self::Stopping => "stopping",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Cooperative stop request shared between the front-end and the pipeline.
///
/// Only read between chunks; a request never interrupts a submission.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Position and state of the current run. Never persisted.
///
/// While running, the indexes point at the document and chunk in progress.
/// After a stop they point at the first position not yet processed.
#[derive(Debug, Clone)]
pub struct RunState {
    pub state: PipelineState,
    pub document_index: usize,
    pub chunk_index: usize,
    pub stop: StopToken,
}

impl RunState {
    pub fn new(stop: StopToken) -> Self {
        Self {
            state: PipelineState::Idle,
            document_index: 0,
            chunk_index: 0,
            stop,
        }
    }
}
