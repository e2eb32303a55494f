//! Writing translated documents back into an EPUB container.

use super::extract::ContentDocument;
use crate::error::{Error, Result};
use crate::text::SegmentRole;
use crate::text::markup::{self, Replacement};
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Rewrite a document with the translations available for its segments.
///
/// `translations[i]` belongs to segment `i`; `None` keeps the original text.
/// Returns `None` when nothing in the document changes.
pub fn render_document(
    document: &ContentDocument,
    translations: &[Option<String>],
    target_lang: &str,
) -> Option<String> {
    let markup = document.markup.as_deref()?;
    if document.parse_error.is_some() {
        return None;
    }

    let replacements: Vec<Replacement<'_>> = document
        .segments
        .iter()
        .zip(&document.spans)
        .zip(translations)
        .filter_map(|((segment, span), translation)| {
            let text = translation.as_deref()?;
            let emphasize = segment.role == SegmentRole::Dialogue
                && !markup::is_emphasized(&markup[span.inner.clone()]);
            Some(Replacement {
                span,
                text,
                emphasize,
            })
        })
        .collect();

    if replacements.is_empty() {
        return None;
    }

    let rewritten = markup::apply_replacements(markup, &replacements);
    Some(markup::set_document_lang(&rewritten, target_lang))
}

/// Copy `input` to `output`, substituting the given documents.
///
/// Every other entry is copied without recompression, so images, styles,
/// metadata and the stored `mimetype` entry stay byte-identical. The output
/// is written to a temporary file beside it and renamed into place.
pub fn write_epub(input: &Path, output: &Path, documents: &BTreeMap<String, String>) -> Result<()> {
    let source = File::open(input)?;
    let mut archive = ZipArchive::new(BufReader::new(source))?;

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;

    let mut pending: HashSet<&str> = documents.keys().map(String::as_str).collect();
    {
        let mut writer = ZipWriter::new(temp.as_file_mut());
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)?.name().to_string();
            match documents.get(&name) {
                Some(markup) => {
                    writer.start_file(name.as_str(), deflated)?;
                    writer.write_all(markup.as_bytes())?;
                    pending.remove(name.as_str());
                }
                None => writer.raw_copy_file(archive.by_index_raw(i)?)?,
            }
        }

        writer.finish()?;
    }

    if let Some(missing) = pending.iter().next() {
        return Err(Error::Assembly(format!(
            "{} is not an entry of {}",
            missing,
            input.display()
        )));
    }

    temp.as_file().sync_all()?;
    // Keep the input's permissions rather than the temp file's private ones
    fs::set_permissions(temp.path(), fs::metadata(input)?.permissions())?;
    temp.persist(output).map_err(|e| Error::Io(e.error))?;

    debug!(
        "Wrote {} with {} rewritten documents",
        output.display(),
        documents.len()
    );
    Ok(())
}

/// Write the final output and drop the partial file it supersedes.
pub fn finalize(
    input: &Path,
    output: &Path,
    partial: &Path,
    documents: &BTreeMap<String, String>,
) -> Result<()> {
    write_epub(input, output, documents)?;
    if partial.exists() && partial != output {
        fs::remove_file(partial)?;
    }
    info!("Wrote {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::extract::{DEFAULT_EXCLUDED_KEYWORDS, extract_documents};
    use crate::test_support::{
        BookFixture, PIXEL_PNG, STYLESHEET, entry_compression, entry_names, read_entry,
        read_entry_text, write_epub as write_fixture,
    };
    use tempfile::TempDir;

    fn keywords() -> Vec<String> {
        DEFAULT_EXCLUDED_KEYWORDS.iter().map(|k| k.to_string()).collect()
    }

    fn fixture(dir: &TempDir) -> (std::path::PathBuf, Vec<ContentDocument>) {
        let path = dir.path().join("book.epub");
        write_fixture(&path, &BookFixture::three_chapters());
        let documents = extract_documents(&path, &keywords()).unwrap();
        (path, documents)
    }

    #[test]
    fn test_render_document_substitutes_and_emphasizes() {
        let dir = TempDir::new().unwrap();
        let (_, documents) = fixture(&dir);

        let ch2 = &documents[2];
        let rendered = render_document(
            ch2,
            &[Some("\u{201c}Wohin gehst du?\u{201d}".to_string())],
            "de",
        )
        .unwrap();
        assert!(rendered.contains("<p><em>\u{201c}Wohin gehst du?\u{201d}</em></p>"));
        assert!(rendered.contains("<img src=\"images/pixel.png\" alt=\"\"/>"));
        assert!(rendered.contains("lang=\"de\" xml:lang=\"de\""));
    }

    #[test]
    fn test_render_document_never_emphasizes_headings() {
        let dir = TempDir::new().unwrap();
        let (_, documents) = fixture(&dir);

        let ch1 = &documents[1];
        let rendered = render_document(
            ch1,
            &[Some("\"Kapitel Eins\"".to_string()), None],
            "de",
        )
        .unwrap();
        assert!(rendered.contains("<h1>\"Kapitel Eins\"</h1>"));
        assert!(rendered.contains("<p>The rain had not stopped.</p>"));
    }

    #[test]
    fn test_render_document_keeps_inline_elements() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.epub");
        write_fixture(
            &path,
            &BookFixture::with_chapters(&[(
                "ch1.xhtml",
                "<p>See <img src=\"images/pixel.png\" alt=\"\"/> the <a href=\"#n1\">note</a>.</p>",
            )]),
        );
        let documents = extract_documents(&path, &keywords()).unwrap();

        let rendered =
            render_document(&documents[1], &[Some("Siehe die Notiz.".to_string())], "de").unwrap();
        assert!(rendered.contains("<img src=\"images/pixel.png\" alt=\"\"/>"));
        assert!(rendered.contains("<a href=\"#n1\">"));
        assert!(!rendered.contains("See"));
        assert!(!rendered.contains("note<"));

        let output = dir.path().join("book.de.epub");
        let mut rewritten = BTreeMap::new();
        rewritten.insert(documents[1].id.clone(), rendered);
        write_epub(&path, &output, &rewritten).unwrap();

        let again = extract_documents(&output, &keywords()).unwrap();
        assert_eq!(again[1].segments[0].text, "Siehe die Notiz.");
    }

    #[test]
    fn test_render_document_without_translations() {
        let dir = TempDir::new().unwrap();
        let (_, documents) = fixture(&dir);
        assert!(render_document(&documents[1], &[None, None], "de").is_none());
        assert!(render_document(&documents[0], &[], "de").is_none());
    }

    #[test]
    fn test_write_epub_preserves_other_entries() {
        let dir = TempDir::new().unwrap();
        let (input, documents) = fixture(&dir);
        let original = fs::read(&input).unwrap();

        let ch3 = &documents[3];
        let mut rewritten = BTreeMap::new();
        rewritten.insert(
            ch3.id.clone(),
            render_document(ch3, &[Some("Niemand antwortete ihr.".to_string())], "de").unwrap(),
        );

        let output = dir.path().join("out").join("book.de.epub");
        write_epub(&input, &output, &rewritten).unwrap();

        assert_eq!(entry_names(&output), entry_names(&input));
        assert_eq!(entry_names(&output)[0], "mimetype");
        assert_eq!(entry_compression(&output, "mimetype"), CompressionMethod::Stored);
        assert_eq!(read_entry(&output, "OEBPS/images/pixel.png"), PIXEL_PNG);
        assert_eq!(read_entry_text(&output, "OEBPS/style.css"), STYLESHEET);
        assert_eq!(
            read_entry(&output, "OEBPS/content.opf"),
            read_entry(&input, "OEBPS/content.opf")
        );
        assert_eq!(
            read_entry(&output, "OEBPS/ch1.xhtml"),
            read_entry(&input, "OEBPS/ch1.xhtml")
        );
        assert!(read_entry_text(&output, "OEBPS/ch3.xhtml").contains("<p>Niemand antwortete ihr.</p>"));

        // Input untouched
        assert_eq!(fs::read(&input).unwrap(), original);
    }

    #[test]
    fn test_write_epub_rejects_unknown_document() {
        let dir = TempDir::new().unwrap();
        let (input, _) = fixture(&dir);

        let mut rewritten = BTreeMap::new();
        rewritten.insert("OEBPS/missing.xhtml".to_string(), "<html/>".to_string());
        let output = dir.path().join("out.epub");
        let err = write_epub(&input, &output, &rewritten).unwrap_err();
        assert!(matches!(err, Error::Assembly(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_finalize_removes_partial() {
        let dir = TempDir::new().unwrap();
        let (input, _) = fixture(&dir);
        let partial = dir.path().join("book.de.partial.epub");
        let output = dir.path().join("book.de.epub");

        write_epub(&input, &partial, &BTreeMap::new()).unwrap();
        assert!(partial.exists());
        finalize(&input, &output, &partial, &BTreeMap::new()).unwrap();
        assert!(output.exists());
        assert!(!partial.exists());
    }
}
