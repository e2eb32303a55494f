//! Small in-memory EPUB builder for tests.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
];
pub const STYLESHEET: &str = "p { text-indent: 1em; }\n";

pub struct BookFixture {
    pub title: String,
    /// (file name under OEBPS/, full XHTML document), in spine order
    pub documents: Vec<(String, String)>,
}

impl BookFixture {
    /// Chapters given as (file name, body markup), preceded by a toc.xhtml.
    pub fn with_chapters(chapters: &[(&str, &str)]) -> Self {
        let mut documents = vec![(
            "toc.xhtml".to_string(),
            xhtml(
                "Contents",
                r#"<h1>Contents</h1><ol><li><a href="ch1.xhtml">One</a></li></ol>"#,
            ),
        )];
        for (name, body) in chapters {
            documents.push((name.to_string(), xhtml(name, body)));
        }
        Self {
            title: "Fixture Book".to_string(),
            documents,
        }
    }

    pub fn three_chapters() -> Self {
        Self::with_chapters(&[
            (
                "ch1.xhtml",
                "<h1>Chapter One</h1>\n<p>The rain had not stopped.</p>",
            ),
            (
                "ch2.xhtml",
                "<p>&#8220;Where are you going?&#8221;</p>\n<p><img src=\"images/pixel.png\" alt=\"\"/></p>",
            ),
            ("ch3.xhtml", "<p>Nobody answered her.</p>"),
        ])
    }
}

pub fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="ko" lang="ko">
<head>
  <title>{}</title>
  <link rel="stylesheet" type="text/css" href="style.css"/>
</head>
<body>
{}
</body>
</html>
"#,
        title, body
    )
}

fn package_document(fixture: &BookFixture) -> String {
    let mut manifest = String::new();
    let mut spine = String::new();
    for (i, (name, _)) in fixture.documents.iter().enumerate() {
        manifest.push_str(&format!(
            "    <item id=\"doc{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            i, name
        ));
        spine.push_str(&format!("    <itemref idref=\"doc{}\"/>\n", i));
    }

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="bookid" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="bookid">urn:uuid:00000000-0000-0000-0000-000000000001</dc:identifier>
    <dc:title>{}</dc:title>
    <dc:language>ko</dc:language>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
    <item id="pixel" href="images/pixel.png" media-type="image/png"/>
{}  </manifest>
  <spine toc="ncx">
{}  </spine>
</package>
"#,
        fixture.title, manifest, spine
    )
}

const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const TOC_NCX: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="urn:uuid:00000000-0000-0000-0000-000000000001"/></head>
  <docTitle><text>Fixture Book</text></docTitle>
  <navMap>
    <navPoint id="p1" playOrder="1"><navLabel><text>One</text></navLabel><content src="ch1.xhtml"/></navPoint>
  </navMap>
</ncx>
"#;

/// Write `fixture` as a valid EPUB 2 container at `path`.
pub fn write_epub(path: &Path, fixture: &BookFixture) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();

    zip.start_file("META-INF/container.xml", deflated).unwrap();
    zip.write_all(CONTAINER_XML.as_bytes()).unwrap();

    zip.start_file("OEBPS/content.opf", deflated).unwrap();
    zip.write_all(package_document(fixture).as_bytes()).unwrap();

    zip.start_file("OEBPS/toc.ncx", deflated).unwrap();
    zip.write_all(TOC_NCX.as_bytes()).unwrap();

    zip.start_file("OEBPS/style.css", deflated).unwrap();
    zip.write_all(STYLESHEET.as_bytes()).unwrap();

    zip.start_file("OEBPS/images/pixel.png", stored).unwrap();
    zip.write_all(PIXEL_PNG).unwrap();

    for (name, content) in &fixture.documents {
        zip.start_file(format!("OEBPS/{}", name), deflated).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }

    zip.finish().unwrap();
}

/// Entry names of an archive in stored order.
pub fn entry_names(path: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

pub fn entry_compression(path: &Path, name: &str) -> CompressionMethod {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    archive.by_name(name).unwrap().compression()
}

pub fn read_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

pub fn read_entry_text(path: &Path, name: &str) -> String {
    String::from_utf8(read_entry(path, name)).unwrap()
}
