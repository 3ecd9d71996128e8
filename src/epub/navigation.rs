//! Navigation document parser
//!
//! Reads the table of contents as an ordered list of (label, anchor) pairs.
//! Two vocabularies are understood:
//!
//! - EPUB 2 NCX (`navMap > navPoint`), located through the reserved manifest
//!   id `ncx` or the spine's `toc` attribute
//! - EPUB 3 navigation documents (`<nav epub:type="toc">`), located through
//!   the `nav` manifest property
//!
//! Only top-level entries are returned. Any failure here is recoverable: the
//! caller gets `None` and falls back to one chapter per spine entry.

use std::io::{Read, Seek};

use quick_xml::de::from_str;
use serde::Deserialize;
use thiserror::Error;

use super::archive::{resolve_href, EpubArchive};
use super::types::{ManifestItem, NavEntry, Package};
use crate::html::normalize_entities;

/// Reserved manifest id of the NCX document
pub const NCX_ID: &str = "ncx";

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";
const OPS_NS: &str = "http://www.idpf.org/2007/ops";

/// Failure to read a navigation document
#[derive(Debug, Error)]
pub enum NavError {
    #[error("NCX parse error: {0}")]
    Ncx(#[from] quick_xml::de::DeError),

    #[error("Navigation document parse error: {0}")]
    Xhtml(#[from] roxmltree::Error),
}

/// Vocabulary of a located navigation document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavFormat {
    Ncx,
    Xhtml,
}

/// Find the navigation document in the manifest
pub fn locate_navigation(package: &Package) -> Option<(&ManifestItem, NavFormat)> {
    let manifest = &package.manifest;

    if let Some(item) = manifest.get(NCX_ID) {
        return Some((item, NavFormat::Ncx));
    }

    if let Some(item) = package.toc_id.as_deref().and_then(|id| manifest.get(id)) {
        return Some((item, format_of(item)));
    }

    manifest
        .items()
        .iter()
        .find(|item| item.has_property("nav"))
        .map(|item| (item, NavFormat::Xhtml))
}

fn format_of(item: &ManifestItem) -> NavFormat {
    if item.media_type == NCX_MEDIA_TYPE || item.href.to_ascii_lowercase().ends_with(".ncx") {
        NavFormat::Ncx
    } else {
        NavFormat::Xhtml
    }
}

/// Load the table of contents, or `None` if it is absent or unreadable
pub fn load_navigation<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    package: &Package,
) -> Option<Vec<NavEntry>> {
    let Some((item, format)) = locate_navigation(package) else {
        tracing::info!("No navigation document declared, using one chapter per spine entry");
        return None;
    };

    let path = resolve_href(&package.base_dir, &item.href);
    let content = match archive.read_text(&path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Navigation document unavailable");
            return None;
        }
    };

    let parsed = match format {
        NavFormat::Ncx => parse_ncx(&content),
        NavFormat::Xhtml => parse_nav_document(&content),
    };

    match parsed {
        Ok(entries) => {
            tracing::debug!(path = %path, entries = entries.len(), ?format, "Parsed navigation");
            Some(entries)
        }
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Failed to parse navigation document");
            None
        }
    }
}

/// Parse an NCX document's top-level nav points
pub fn parse_ncx(xml: &str) -> Result<Vec<NavEntry>, NavError> {
    let ncx: NcxXml = from_str(xml)?;

    Ok(ncx
        .nav_map
        .nav_point
        .into_iter()
        .filter_map(|point| {
            let label = point.nav_label.map(|l| l.text).unwrap_or_default();
            match point.content {
                Some(content) => Some(NavEntry::new(collapse_whitespace(&label), &content.src)),
                None => {
                    tracing::warn!(label = %label, "Skipping navPoint without content");
                    None
                }
            }
        })
        .collect())
}

/// Parse an EPUB 3 navigation document's top-level toc entries
pub fn parse_nav_document(xhtml: &str) -> Result<Vec<NavEntry>, NavError> {
    let text = normalize_entities(xhtml);
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(&text, options)?;

    let navs: Vec<roxmltree::Node> = doc.descendants().filter(|n| n.has_tag_name("nav")).collect();
    let toc_nav = navs
        .iter()
        .find(|nav| {
            nav.attribute((OPS_NS, "type"))
                .map(|t| t.split_whitespace().any(|t| t == "toc"))
                .unwrap_or(false)
        })
        .or_else(|| navs.first());

    let Some(list) = toc_nav.and_then(|nav| nav.descendants().find(|n| n.has_tag_name("ol")))
    else {
        return Ok(Vec::new());
    };

    Ok(list
        .children()
        .filter(|n| n.has_tag_name("li"))
        .filter_map(|li| li.children().find(|n| n.has_tag_name("a")))
        .filter_map(|a| {
            let href = a.attribute("href")?;
            let label: String = a
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect();
            Some(NavEntry::new(collapse_whitespace(&label), href))
        })
        .collect())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// NCX XML structures for deserialization

#[derive(Debug, Deserialize)]
struct NcxXml {
    #[serde(rename = "navMap")]
    nav_map: NavMapXml,
}

#[derive(Debug, Deserialize)]
struct NavMapXml {
    #[serde(rename = "navPoint", default)]
    nav_point: Vec<NavPointXml>,
}

#[derive(Debug, Deserialize)]
struct NavPointXml {
    #[serde(rename = "navLabel", default)]
    nav_label: Option<NavLabelXml>,

    #[serde(default)]
    content: Option<ContentXml>,
}

#[derive(Debug, Deserialize)]
struct NavLabelXml {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ContentXml {
    #[serde(rename = "@src", default)]
    src: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::package::parse_package;
    use crate::epub::test_helpers::{ncx_xml, package_xml, zip_bytes};
    use crate::epub::types::Anchor;

    const NAV_XHTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="landmarks"><ol><li><a href="cover.xhtml">Cover</a></li></ol></nav>
  <nav epub:type="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="ch1.xhtml">Prologue&nbsp;and
          <em>Setting</em></a></li>
      <li><span>Part One</span></li>
      <li><a href="ch2.xhtml#s1">Chapter 1</a>
        <ol><li><a href="ch2.xhtml#s1-1">Nested</a></li></ol>
      </li>
    </ol>
  </nav>
</body>
</html>"#;

    #[test]
    fn test_parse_ncx() {
        let xml = ncx_xml(&[("Intro", "ch1.xhtml"), ("Chapter One", "ch2.xhtml#c1")]);
        let entries = parse_ncx(&xml).unwrap();

        assert_eq!(
            entries,
            vec![
                NavEntry {
                    label: "Intro".to_string(),
                    anchor: Anchor::WholeDocument,
                },
                NavEntry {
                    label: "Chapter One".to_string(),
                    anchor: Anchor::ElementId("c1".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_parse_ncx_ignores_nested_points() {
        let xml = r#"<ncx><navMap>
  <navPoint id="a"><navLabel><text>  Part
     One </text></navLabel><content src="p1.xhtml"/>
    <navPoint id="a1"><navLabel><text>Inner</text></navLabel><content src="p1.xhtml#x"/></navPoint>
  </navPoint>
  <navPoint id="b"><navLabel><text>Part Two</text></navLabel><content src="p2.xhtml#two"/></navPoint>
</navMap></ncx>"#;

        let entries = parse_ncx(xml).unwrap();
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Part One", "Part Two"]);
    }

    #[test]
    fn test_parse_nav_document() {
        let entries = parse_nav_document(NAV_XHTML).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label, "Prologue and Setting");
        assert_eq!(entries[0].anchor, Anchor::WholeDocument);
        assert_eq!(entries[1].label, "Chapter 1");
        assert_eq!(entries[1].anchor, Anchor::ElementId("s1".to_string()));
    }

    #[test]
    fn test_locate_prefers_reserved_ncx_id() {
        let package = parse_package(
            &package_xml(
                &[
                    ("nav", "nav.xhtml", "application/xhtml+xml"),
                    ("ncx", "toc.ncx", "application/x-dtbncx+xml"),
                ],
                &[],
            ),
            "OEBPS/content.opf",
        )
        .unwrap();

        let (item, format) = locate_navigation(&package).unwrap();
        assert_eq!(item.id, "ncx");
        assert_eq!(format, NavFormat::Ncx);
    }

    #[test]
    fn test_locate_falls_back_to_spine_toc_attribute() {
        let xml = r#"<package>
  <manifest><item id="contents" href="contents.ncx" media-type="application/x-dtbncx+xml"/></manifest>
  <spine toc="contents"/>
</package>"#;
        let package = parse_package(xml, "content.opf").unwrap();

        let (item, format) = locate_navigation(&package).unwrap();
        assert_eq!(item.id, "contents");
        assert_eq!(format, NavFormat::Ncx);
    }

    #[test]
    fn test_locate_falls_back_to_nav_property() {
        let xml = r#"<package>
  <manifest><item id="toc" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/></manifest>
  <spine/>
</package>"#;
        let package = parse_package(xml, "content.opf").unwrap();

        let (item, format) = locate_navigation(&package).unwrap();
        assert_eq!(item.href, "nav.xhtml");
        assert_eq!(format, NavFormat::Xhtml);
    }

    #[test]
    fn test_missing_or_malformed_navigation_is_none() {
        let package = parse_package(
            &package_xml(&[("ncx", "toc.ncx", "application/x-dtbncx+xml")], &[]),
            "OEBPS/content.opf",
        )
        .unwrap();

        let mut empty = EpubArchive::from_bytes(zip_bytes(&[("mimetype", "x")])).unwrap();
        assert_eq!(load_navigation(&mut empty, &package), None);

        let mut broken =
            EpubArchive::from_bytes(zip_bytes(&[("OEBPS/toc.ncx", "<ncx><navMap>")])).unwrap();
        assert_eq!(load_navigation(&mut broken, &package), None);
    }

    #[test]
    fn test_load_navigation_resolves_against_package_dir() {
        let package = parse_package(
            &package_xml(&[("ncx", "toc.ncx", "application/x-dtbncx+xml")], &[]),
            "OEBPS/content.opf",
        )
        .unwrap();
        let ncx = ncx_xml(&[("One", "ch1.xhtml")]);
        let mut archive = EpubArchive::from_bytes(zip_bytes(&[("OEBPS/toc.ncx", &ncx)])).unwrap();

        let entries = load_navigation(&mut archive, &package).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "One");
    }
}
