//! In-memory EPUB fixtures for tests

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a zip archive from (path, content) pairs
pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (path, content) in files {
        let options = if *path == "mimetype" {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
        };
        writer.start_file(*path, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// container.xml pointing at a single package document
pub fn container_xml(package_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
        package_path
    )
}

/// Package document with (id, href, media-type) items and a spine of idrefs
pub fn package_xml(items: &[(&str, &str, &str)], spine: &[&str]) -> String {
    let items: String = items
        .iter()
        .map(|(id, href, media_type)| {
            format!(
                r#"    <item id="{}" href="{}" media-type="{}"/>
"#,
                id, href, media_type
            )
        })
        .collect();
    let itemrefs: String = spine
        .iter()
        .map(|idref| format!("    <itemref idref=\"{}\"/>\n", idref))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Fixture</dc:title>
  </metadata>
  <manifest>
{}  </manifest>
  <spine toc="ncx">
{}  </spine>
</package>"#,
        items, itemrefs
    )
}

/// NCX document with top-level (label, src) nav points
pub fn ncx_xml(points: &[(&str, &str)]) -> String {
    let points: String = points
        .iter()
        .enumerate()
        .map(|(i, (label, src))| {
            format!(
                r#"    <navPoint id="np{0}" playOrder="{0}">
      <navLabel><text>{1}</text></navLabel>
      <content src="{2}"/>
    </navPoint>
"#,
                i + 1,
                label,
                src
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="uid"/></head>
  <docTitle><text>Fixture</text></docTitle>
  <navMap>
{}  </navMap>
</ncx>"#,
        points
    )
}

/// XHTML content document wrapping a body fragment
pub fn xhtml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Fixture</title></head>
<body>
{}
</body>
</html>"#,
        body
    )
}

/// Builder for a complete EPUB with the package document at OEBPS/content.opf
pub struct EpubFixture {
    files: Vec<(String, String)>,
}

impl EpubFixture {
    pub fn new() -> Self {
        Self {
            files: vec![
                ("mimetype".to_string(), "application/epub+zip".to_string()),
                (
                    "META-INF/container.xml".to_string(),
                    container_xml("OEBPS/content.opf"),
                ),
            ],
        }
    }

    /// Start without a container descriptor
    pub fn bare() -> Self {
        Self {
            files: vec![("mimetype".to_string(), "application/epub+zip".to_string())],
        }
    }

    pub fn file(mut self, path: &str, content: impl Into<String>) -> Self {
        self.files.retain(|(existing, _)| existing != path);
        self.files.push((path.to_string(), content.into()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let files: Vec<(&str, &str)> = self
            .files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
            .collect();
        zip_bytes(&files)
    }
}

/// The two-document book used throughout the tests
///
/// Navigation: "Intro" covers all of ch1.xhtml, "Chapter One" starts at
/// `id="c1"` partway through ch2.xhtml.
pub fn sample_epub() -> Vec<u8> {
    EpubFixture::new()
        .file(
            "OEBPS/content.opf",
            package_xml(
                &[
                    ("p1", "ch1.xhtml", "application/xhtml+xml"),
                    ("p2", "ch2.xhtml", "application/xhtml+xml"),
                    ("ncx", "toc.ncx", "application/x-dtbncx+xml"),
                ],
                &["p1", "p2"],
            ),
        )
        .file(
            "OEBPS/toc.ncx",
            ncx_xml(&[("Intro", "ch1.xhtml"), ("Chapter One", "ch2.xhtml#c1")]),
        )
        .file(
            "OEBPS/ch1.xhtml",
            xhtml("<h1>Welcome</h1>\n<p>Opening words.</p>"),
        )
        .file(
            "OEBPS/ch2.xhtml",
            xhtml("<p>Front matter.</p>\n<h2 id=\"c1\">Chapter One</h2>\n<p>It <em>begins</em>.</p>"),
        )
        .build()
}

/// Text that deflates to well over a hundred bytes
pub fn varied_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("line {} {}\n", i, i * 7919 % 10007))
        .collect()
}

/// Flip a few bytes inside the compressed data of the first entry named `name`
pub fn corrupt_entry(mut data: Vec<u8>, name: &str) -> Vec<u8> {
    let header = data
        .windows(name.len())
        .position(|window| window == name.as_bytes())
        .unwrap();
    let start = header + name.len() + 40;
    for byte in &mut data[start..start + 6] {
        *byte ^= 0xFF;
    }
    data
}
