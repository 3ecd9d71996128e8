//! EPUB parsing module
//!
//! Opens an EPUB held in memory and splits its reading order into chapters
//! aligned with the table of contents.
//!
//! Pipeline: archive → container.xml → package document → navigation →
//! chapter splitter. Only the first three steps can fail a conversion;
//! navigation and content problems degrade the output instead.

mod archive;
mod container;
mod error;
mod navigation;
mod package;
mod splitter;
mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::io::{Cursor, Read, Seek};

pub use archive::{parent_dir, resolve_href, EpubArchive};
pub use container::{parse_container, resolve_package_path, RootFile, CONTAINER_PATH};
pub use error::{ArchiveError, EpubError, Result};
pub use navigation::{
    load_navigation, locate_navigation, parse_nav_document, parse_ncx, NavError, NavFormat, NCX_ID,
};
pub use package::{load_package, parse_package};
pub use splitter::{parse_content, split_book, SplitState, Splitter};
pub use types::{
    Anchor, Chapter, Conversion, Manifest, ManifestItem, NavEntry, Package, SpineEntry,
};

/// An opened book, ready to be split
pub struct EpubBook<R> {
    archive: EpubArchive<R>,
    package: Package,
    navigation: Option<Vec<NavEntry>>,
}

impl EpubBook<Cursor<Vec<u8>>> {
    /// Open an EPUB held in memory
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_archive(EpubArchive::from_bytes(data)?)
    }
}

impl<R: Read + Seek> EpubBook<R> {
    /// Resolve the package and navigation of an opened archive
    pub fn from_archive(mut archive: EpubArchive<R>) -> Result<Self> {
        let package_path = resolve_package_path(&mut archive)?;
        let package = load_package(&mut archive, &package_path)?;
        let navigation = load_navigation(&mut archive, &package);

        tracing::debug!(
            package = %package.path,
            manifest = package.manifest.len(),
            spine = package.spine.len(),
            nav_entries = navigation.as_ref().map(Vec::len),
            "Opened EPUB"
        );

        Ok(Self {
            archive,
            package,
            navigation,
        })
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Top-level navigation entries, if a navigation document was readable
    pub fn navigation(&self) -> Option<&[NavEntry]> {
        self.navigation.as_deref()
    }

    pub fn split_chapters(&mut self) -> Vec<Chapter> {
        let nav = self.navigation.as_deref().unwrap_or_default();
        split_book(&mut self.archive, &self.package, nav)
    }

    /// Split the book and attach the navigation labels
    pub fn into_conversion(mut self) -> Conversion {
        let chapters = self.split_chapters();
        let toc = self
            .navigation
            .filter(|entries| !entries.is_empty())
            .map(|entries| entries.into_iter().map(|entry| entry.label).collect());

        Conversion { chapters, toc }
    }
}

/// Convert an uploaded EPUB into chapters
pub fn convert(data: Vec<u8>) -> Result<Conversion> {
    Ok(EpubBook::from_bytes(data)?.into_conversion())
}
