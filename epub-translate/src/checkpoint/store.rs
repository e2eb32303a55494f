//! Durable chunk-id to translation mapping backed by a JSON Lines file.

use super::types::CheckpointEntry;
use crate::error::{Error, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Append-only checkpoint store.
///
/// Every `put` is written, flushed and synced before it returns, so an entry
/// either survives a crash whole or not at all. Unreadable lines found on
/// open are dropped with a warning rather than failing the run.
#[derive(Debug)]
pub struct CheckpointStore {
    entries: HashMap<String, CheckpointEntry>,
    file: File,
}

impl CheckpointStore {
    /// Open the store at `path`, creating it if missing.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            load_entries(path)?
        } else {
            HashMap::new()
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(
            "Opened checkpoint store {} with {} entries",
            path.display(),
            entries.len()
        );

        Ok(Self {
            entries,
            file,
        })
    }

    pub fn has(&self, chunk_id: &str) -> bool {
        self.entries.contains_key(chunk_id)
    }

    /// Stored translation for `chunk_id`.
    pub fn get(&self, chunk_id: &str) -> Result<&str> {
        self.entries
            .get(chunk_id)
            .map(|e| e.text.as_str())
            .ok_or_else(|| Error::CheckpointMiss(chunk_id.to_string()))
    }

    /// Full stored entry, including the source fingerprint.
    pub fn entry(&self, chunk_id: &str) -> Option<&CheckpointEntry> {
        self.entries.get(chunk_id)
    }

    /// Persist the translation of a chunk.
    ///
    /// Repeating an identical put is a no-op. A put for a stored id with a
    /// different text or source fails with [`Error::CheckpointConflict`].
    pub fn put(&mut self, chunk_id: &str, source: &str, text: &str) -> Result<()> {
        if let Some(existing) = self.entries.get(chunk_id) {
            if existing.text == text && existing.matches_source(source) {
                return Ok(());
            }
            return Err(Error::CheckpointConflict {
                chunk_id: chunk_id.to_string(),
            });
        }

        let entry = CheckpointEntry::new(chunk_id, source, text);
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        line.push('\n');

        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;

        self.entries.insert(chunk_id.to_string(), entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by chunk id.
    pub fn entries(&self) -> Vec<&CheckpointEntry> {
        let mut entries: Vec<&CheckpointEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Drop every entry, forcing retranslation on the next run.
    pub fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.entries.clear();
        Ok(())
    }
}

/// Read all valid entries; rewrite the file if anything had to be dropped.
fn load_entries(path: &Path) -> Result<HashMap<String, CheckpointEntry>> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);

    let mut entries = HashMap::new();
    let mut order = Vec::new();
    let mut dropped = 0usize;

    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CheckpointEntry>(line) {
            Ok(entry) if entries.contains_key(&entry.id) => {
                warn!(
                    "Checkpoint {} line {}: duplicate entry for {} ignored",
                    path.display(),
                    number + 1,
                    entry.id
                );
                dropped += 1;
            }
            Ok(entry) => {
                order.push(entry.id.clone());
                entries.insert(entry.id.clone(), entry);
            }
            Err(e) => {
                warn!(
                    "Checkpoint {} line {} unreadable, skipping: {}",
                    path.display(),
                    number + 1,
                    e
                );
                dropped += 1;
            }
        }
    }

    let torn_tail = !content.is_empty() && !content.ends_with('\n');
    if dropped > 0 || torn_tail {
        warn!(
            "Rewriting checkpoint {} with {} valid entries ({} dropped)",
            path.display(),
            entries.len(),
            dropped
        );
        rewrite(path, &order, &entries)?;
    }

    Ok(entries)
}

/// Replace the store file atomically with the given entries.
fn rewrite(path: &Path, order: &[String], entries: &HashMap<String, CheckpointEntry>) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    for id in order {
        if let Some(entry) = entries.get(id) {
            let line = serde_json::to_string(entry)
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            writeln!(temp, "{}", line)?;
        }
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
