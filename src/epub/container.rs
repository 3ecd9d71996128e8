//! Container resolver
//!
//! Reads `META-INF/container.xml` and returns the path of the package
//! document it declares.

use std::io::{Read, Seek};

use quick_xml::de::from_str;
use serde::Deserialize;

use super::archive::EpubArchive;
use super::error::{EpubError, Result};

/// Fixed location of the container descriptor
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// A root-file reference from the container descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: Option<String>,
}

/// Locate the package document declared by the container descriptor
pub fn resolve_package_path<R: Read + Seek>(archive: &mut EpubArchive<R>) -> Result<String> {
    let xml = archive
        .read_text(CONTAINER_PATH)
        .map_err(|e| e.into_metadata_error("container descriptor"))?;

    let root_files = parse_container(&xml)?;
    let first = root_files.into_iter().next().ok_or_else(|| {
        EpubError::MetadataMissing("no package document declared in container.xml".to_string())
    })?;

    tracing::debug!(
        path = %first.full_path,
        media_type = ?first.media_type,
        "Resolved package document"
    );

    Ok(first.full_path)
}

/// Parse root-file references, skipping entries without a path
pub fn parse_container(xml: &str) -> Result<Vec<RootFile>> {
    let container: ContainerXml = from_str(xml)
        .map_err(|e| EpubError::MetadataMalformed(format!("container.xml: {}", e)))?;

    Ok(container
        .rootfiles
        .rootfile
        .into_iter()
        .filter_map(|rf| {
            let full_path = rf.full_path.filter(|p| !p.trim().is_empty())?;
            Some(RootFile {
                full_path: full_path.trim().to_string(),
                media_type: rf.media_type,
            })
        })
        .collect())
}

// container.xml structures for deserialization

#[derive(Debug, Deserialize)]
struct ContainerXml {
    #[serde(default)]
    rootfiles: RootFilesXml,
}

#[derive(Debug, Default, Deserialize)]
struct RootFilesXml {
    #[serde(default)]
    rootfile: Vec<RootFileXml>,
}

#[derive(Debug, Deserialize)]
struct RootFileXml {
    #[serde(rename = "@full-path", default)]
    full_path: Option<String>,

    #[serde(rename = "@media-type", default)]
    media_type: Option<String>,
}
