//! Opening an EPUB and listing its spine.

use crate::error::{Error, Result};
use epub::doc::EpubDoc;
use log::{debug, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// A manifest item referenced from the spine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    /// Entry name inside the ZIP archive
    pub path: String,
    pub media_type: String,
}

impl SpineItem {
    pub fn is_xhtml(&self) -> bool {
        matches!(
            self.media_type.as_str(),
            "application/xhtml+xml" | "text/html" | "application/xml"
        )
    }
}

/// An open EPUB file.
pub struct Container {
    path: PathBuf,
    doc: EpubDoc<BufReader<File>>,
    title: Option<String>,
    spine: Vec<SpineItem>,
}

impl Container {
    /// Open an EPUB and read its package document. The file is only ever read.
    pub fn open(path: &Path) -> Result<Self> {
        let doc = EpubDoc::new(path).map_err(|e| read_error(path, e))?;

        let title = doc
            .mdata("title")
            .map(|m| m.value.trim().to_string())
            .filter(|t| !t.is_empty());

        let spine: Vec<SpineItem> = doc
            .spine
            .iter()
            .filter_map(|item| match doc.resources.get(&item.idref) {
                Some(resource) => Some(SpineItem {
                    idref: item.idref.clone(),
                    path: entry_name(&resource.path),
                    media_type: resource.mime.clone(),
                }),
                None => {
                    warn!("Spine references unknown manifest item '{}'", item.idref);
                    None
                }
            })
            .collect();
        if spine.is_empty() {
            return Err(read_error(path, "package document has an empty spine"));
        }

        debug!(
            "Opened {} ({}): {} spine items",
            path.display(),
            title.as_deref().unwrap_or("untitled"),
            spine.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            doc,
            title,
            spine,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Spine items in reading order.
    pub fn spine(&self) -> &[SpineItem] {
        &self.spine
    }

    /// Raw bytes of a spine item.
    pub fn read(&mut self, item: &SpineItem) -> Result<Vec<u8>> {
        self.doc
            .get_resource(&item.idref)
            .map(|(bytes, _mime)| bytes)
            .ok_or_else(|| read_error(&self.path, format!("{} cannot be read", item.path)))
    }
}

/// Archive entry name for a resource path relative to the container root.
fn entry_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn read_error(path: &Path, reason: impl ToString) -> Error {
    Error::ContainerRead {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
