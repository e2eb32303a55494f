//! Drives documents and chunks through the checkpoint store and the transport.

use super::PipelineOptions;
use super::events::{PipelineEvent, RunOutcome};
use super::state::{PipelineState, RunState, StopToken};
use crate::checkpoint::CheckpointStore;
use crate::config::OversizedPolicy;
use crate::epub::{self, ContentDocument};
use crate::error::{Error, Result};
use crate::text::{Chunk, SEGMENT_SEPARATOR, TextSegment, build_chunks, scrub_separator, split_oversized};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use translate_client::{TranslateError, TranslationRequest, Translator};

/// A document with the chunks it was packed into.
struct Planned {
    document: ContentDocument,
    chunks: Vec<Chunk>,
}

enum Progress {
    Completed,
    Stopped,
}

enum DocumentProgress {
    /// All chunks done; `fresh` of them were translated in this run
    Done { fresh: usize },
    Stopped,
}

/// Sequential, resumable translation of one book.
///
/// Chunks are submitted one at a time in spine order. A chunk with a
/// checkpoint entry is never sent again, and every translation is persisted
/// before the next chunk starts.
pub struct Orchestrator<T> {
    options: PipelineOptions,
    translator: T,
    store: CheckpointStore,
    run: RunState,
    /// Rewritten markup of every document with at least one translation
    rendered: BTreeMap<String, String>,
}

impl<T: Translator> Orchestrator<T> {
    pub fn new(
        options: PipelineOptions,
        translator: T,
        store: CheckpointStore,
        stop: StopToken,
    ) -> Self {
        Self {
            options,
            translator,
            store,
            run: RunState::new(stop),
            rendered: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.run.state
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    /// Translate the book, reporting progress through `on_event`.
    ///
    /// Returns an error for fatal failures (unreadable container, checkpoint
    /// conflict, quota, exhausted retries); the checkpoint store and the
    /// partial output stay valid for a later resume either way.
    pub async fn run<F>(&mut self, mut on_event: F) -> Result<RunOutcome>
    where
        F: FnMut(PipelineEvent),
    {
        self.run.state = PipelineState::Idle;
        self.rendered.clear();

        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(e) => return Err(self.abort(e, false, &mut on_event)),
        };

        let total_chunks: usize = plan.iter().map(|p| p.chunks.len()).sum();
        let reusable = plan
            .iter()
            .flat_map(|p| &p.chunks)
            .filter(|c| self.store.has(&c.id))
            .count();
        info!(
            "{} documents, {} chunks, {} already translated",
            plan.len(),
            total_chunks,
            reusable
        );
        on_event(PipelineEvent::Started {
            documents: plan.len(),
            total_chunks,
            reusable,
        });

        match self.process(&plan, &mut on_event).await {
            Ok(Progress::Completed) => {
                if let Err(e) = epub::finalize(
                    &self.options.input,
                    &self.options.output,
                    &self.options.partial,
                    &self.rendered,
                ) {
                    return Err(self.abort(e, false, &mut on_event));
                }
                self.run.state = PipelineState::Finished;
                let output = self.options.output.clone();
                on_event(PipelineEvent::Finished {
                    output: output.clone(),
                });
                Ok(RunOutcome::Finished { output })
            }
            Ok(Progress::Stopped) => {
                if let Err(e) = self.write_partial(&mut on_event) {
                    return Err(self.abort(e, false, &mut on_event));
                }
                info!(
                    "Stopped before document {}, chunk {}",
                    self.run.document_index + 1,
                    self.run.chunk_index + 1
                );
                on_event(PipelineEvent::Stopped);
                Ok(RunOutcome::Stopped {
                    partial: self.options.partial.clone(),
                })
            }
            Err(e) => Err(self.abort(e, true, &mut on_event)),
        }
    }

    fn plan(&self) -> Result<Vec<Planned>> {
        let documents =
            epub::extract_documents(&self.options.input, &self.options.excluded_keywords)?;

        Ok(documents
            .into_iter()
            .map(|document| {
                let chunks = if document.is_translatable() {
                    build_chunks(&document.id, &document.segments, self.options.max_chunk_chars)
                } else {
                    Vec::new()
                };
                Planned { document, chunks }
            })
            .collect())
    }

    fn abort<F>(&mut self, err: Error, save: bool, on_event: &mut F) -> Error
    where
        F: FnMut(PipelineEvent),
    {
        self.run.state = PipelineState::Aborted;
        error!("Run aborted: {}", err);

        if save {
            if let Err(e) = self.write_partial(on_event) {
                warn!("Could not save partial output: {}", e);
            }
        }

        on_event(PipelineEvent::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
        err
    }

    fn write_partial<F>(&self, on_event: &mut F) -> Result<()>
    where
        F: FnMut(PipelineEvent),
    {
        epub::write_epub(&self.options.input, &self.options.partial, &self.rendered)?;
        info!("Saved progress to {}", self.options.partial.display());
        on_event(PipelineEvent::PartialWritten {
            path: self.options.partial.clone(),
        });
        Ok(())
    }

    async fn process<F>(&mut self, plan: &[Planned], on_event: &mut F) -> Result<Progress>
    where
        F: FnMut(PipelineEvent),
    {
        for (document_index, planned) in plan.iter().enumerate() {
            let document = &planned.document;
            if self.run.stop.is_requested() {
                self.run.state = PipelineState::Stopping;
                self.run.document_index = document_index;
                self.run.chunk_index = 0;
                return Ok(Progress::Stopped);
            }

            self.run.document_index = document_index;
            self.run.chunk_index = 0;
            self.run.state = PipelineState::RunningDocument;

            if planned.chunks.is_empty() {
                debug!("Passing {} through unchanged", document.id);
                on_event(PipelineEvent::DocumentDone {
                    document_id: document.id.clone(),
                });
                continue;
            }

            let mut translations: Vec<Option<String>> = vec![None; document.segments.len()];
            let outcome = self
                .process_document(planned, &mut translations, on_event)
                .await;

            // Render even a partly translated document so a stop or abort keeps it
            if let Some(markup) =
                epub::render_document(document, &translations, &self.options.target_lang)
            {
                self.rendered.insert(document.id.clone(), markup);
            }

            match outcome? {
                DocumentProgress::Done { fresh } => {
                    on_event(PipelineEvent::DocumentDone {
                        document_id: document.id.clone(),
                    });
                    if fresh > 0 {
                        self.write_partial(on_event)?;
                    }
                }
                DocumentProgress::Stopped => return Ok(Progress::Stopped),
            }
        }

        Ok(Progress::Completed)
    }

    async fn process_document<F>(
        &mut self,
        planned: &Planned,
        translations: &mut [Option<String>],
        on_event: &mut F,
    ) -> Result<DocumentProgress>
    where
        F: FnMut(PipelineEvent),
    {
        let document = &planned.document;
        let total_chunks = planned.chunks.len();
        let mut fresh = 0;

        for (chunk_index, chunk) in planned.chunks.iter().enumerate() {
            self.run.chunk_index = chunk_index;
            if self.run.stop.is_requested() {
                self.run.state = PipelineState::Stopping;
                return Ok(DocumentProgress::Stopped);
            }
            self.run.state = PipelineState::RunningChunk;

            let stored = self
                .store
                .entry(&chunk.id)
                .map(|e| (e.matches_source(&chunk.source), e.text.clone()));

            let (text, reused) = match stored {
                Some((true, text)) => (text, true),
                Some((false, _)) => {
                    return Err(Error::CheckpointConflict {
                        chunk_id: chunk.id.clone(),
                    });
                }
                None => {
                    let text = self.translate_chunk(chunk, &document.segments).await?;
                    self.store.put(&chunk.id, &chunk.source, &text)?;
                    fresh += 1;
                    (text, false)
                }
            };

            let parts = chunk
                .split_translation(&text)
                .ok_or_else(|| Error::CheckpointConflict {
                    chunk_id: chunk.id.clone(),
                })?;
            for (offset, part) in parts.into_iter().enumerate() {
                translations[chunk.segments.start + offset] = Some(part);
            }

            debug!(
                "{} chunk {}/{} ({})",
                document.id,
                chunk_index + 1,
                total_chunks,
                if reused { "from checkpoint" } else { "translated" }
            );
            on_event(PipelineEvent::ChunkDone {
                document_id: document.id.clone(),
                chunk_index,
                total_chunks,
                reused,
            });
        }

        Ok(DocumentProgress::Done { fresh })
    }

    /// Translate one chunk into text that splits back into its segments.
    async fn translate_chunk(&self, chunk: &Chunk, segments: &[TextSegment]) -> Result<String> {
        let max = self.options.max_chunk_chars;
        let len = chunk.char_len();
        if len > max {
            return match self.options.oversized_policy {
                OversizedPolicy::Reject => Err(Error::from_transport(
                    &chunk.id,
                    TranslateError::InputTooLong { len, max },
                )),
                OversizedPolicy::Split => self.translate_oversized(chunk).await,
            };
        }

        let reply = self.request(&chunk.id, &chunk.source).await?;
        if chunk.split_translation(&reply).is_some() {
            return Ok(reply);
        }
        if chunk.segment_count() == 1 {
            return non_empty(&chunk.id, scrub_separator(&reply));
        }

        warn!(
            "Translation of {} does not line up with its {} segments; translating them one by one",
            chunk.id,
            chunk.segment_count()
        );
        let mut parts = Vec::with_capacity(chunk.segment_count());
        for segment in &segments[chunk.segments.clone()] {
            let reply = self.request(&chunk.id, &segment.text).await?;
            parts.push(non_empty(&chunk.id, scrub_separator(&reply))?);
        }
        Ok(parts.join(SEGMENT_SEPARATOR))
    }

    /// A single segment over the budget, cut into pieces that fit.
    async fn translate_oversized(&self, chunk: &Chunk) -> Result<String> {
        let pieces = split_oversized(&chunk.source, self.options.max_chunk_chars);
        info!(
            "{} has {} characters, over the {} limit; translating it in {} pieces",
            chunk.id,
            chunk.char_len(),
            self.options.max_chunk_chars,
            pieces.len()
        );

        let mut translated = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            let reply = self.request(&chunk.id, piece).await?;
            translated.push(scrub_separator(&reply));
        }
        non_empty(&chunk.id, translated.join(" ").trim().to_string())
    }

    async fn request(&self, chunk_id: &str, text: &str) -> Result<String> {
        let request =
            TranslationRequest::new(&self.options.source_lang, &self.options.target_lang, text);
        self.translator
            .translate(&request)
            .await
            .map_err(|e| Error::from_transport(chunk_id, e))
    }
}

fn non_empty(chunk_id: &str, text: String) -> Result<String> {
    if text.is_empty() {
        return Err(Error::from_transport(
            chunk_id,
            TranslateError::Rejected("service returned an empty translation".to_string()),
        ));
    }
    Ok(text)
}
