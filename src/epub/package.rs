//! Package document (OPF) parser
//!
//! Extracts the manifest and spine. Metadata is ignored: chapter extraction
//! only needs to know which files exist and in what order they are read.

use std::io::{Read, Seek};

use quick_xml::de::from_str;
use serde::Deserialize;

use super::archive::{parent_dir, EpubArchive};
use super::error::{EpubError, Result};
use super::types::{Manifest, ManifestItem, Package, SpineEntry};

/// Read and parse the package document at `path` (relative to the archive root)
pub fn load_package<R: Read + Seek>(archive: &mut EpubArchive<R>, path: &str) -> Result<Package> {
    let xml = archive
        .read_text(path)
        .map_err(|e| e.into_metadata_error("package document"))?;

    parse_package(&xml, path)
}

/// Parse package document XML located at `path`
pub fn parse_package(xml: &str, path: &str) -> Result<Package> {
    let package: PackageXml = from_str(xml)
        .map_err(|e| EpubError::MetadataMalformed(format!("{}: {}", path, e)))?;

    let mut manifest = Manifest::default();
    for item in package.manifest.item {
        match (item.id, item.href, item.media_type) {
            (Some(id), Some(href), Some(media_type)) => {
                let item = ManifestItem {
                    id,
                    href,
                    media_type,
                    properties: item.properties,
                };
                let id = item.id.clone();
                if !manifest.insert(item) {
                    tracing::warn!(id = %id, "Duplicate manifest id, keeping first declaration");
                }
            }
            (id, href, _) => {
                tracing::warn!(
                    id = ?id,
                    href = ?href,
                    "Skipping manifest item with missing attributes"
                );
            }
        }
    }

    let spine: Vec<SpineEntry> = package
        .spine
        .itemref
        .into_iter()
        .filter_map(|itemref| match itemref.idref {
            Some(idref) if !idref.is_empty() => Some(SpineEntry { idref }),
            _ => {
                tracing::warn!("Skipping spine itemref without idref");
                None
            }
        })
        .collect();

    tracing::debug!(
        path = %path,
        manifest_items = manifest.len(),
        spine_entries = spine.len(),
        "Parsed package document"
    );

    Ok(Package {
        path: path.to_string(),
        base_dir: parent_dir(path).to_string(),
        manifest,
        spine,
        toc_id: package.spine.toc.filter(|id| !id.is_empty()),
    })
}

// OPF XML structures for deserialization

#[derive(Debug, Deserialize)]
struct PackageXml {
    manifest: ManifestXml,
    spine: SpineXml,
}

#[derive(Debug, Deserialize)]
struct ManifestXml {
    #[serde(default)]
    item: Vec<ManifestItemXml>,
}

#[derive(Debug, Deserialize)]
struct ManifestItemXml {
    #[serde(rename = "@id", default)]
    id: Option<String>,

    #[serde(rename = "@href", default)]
    href: Option<String>,

    #[serde(rename = "@media-type", default)]
    media_type: Option<String>,

    #[serde(rename = "@properties", default)]
    properties: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpineXml {
    #[serde(rename = "@toc", default)]
    toc: Option<String>,

    #[serde(default)]
    itemref: Vec<ItemRefXml>,
}

#[derive(Debug, Deserialize)]
struct ItemRefXml {
    #[serde(rename = "@idref", default)]
    idref: Option<String>,
}
