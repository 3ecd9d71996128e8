//! Archive reader
//!
//! Random-access view over the zip container of an EPUB. Entry names are
//! listed once at open time and looked up linearly; nothing assumes the zip
//! central directory is sorted or indexed.

use std::io::{Cursor, Read, Seek};

use zip::result::ZipError;
use zip::ZipArchive;

use super::error::{ArchiveError, EpubError, Result};

/// Largest uncompressed entry read by default (64 MiB)
pub const DEFAULT_ENTRY_LIMIT: u64 = 64 * 1024 * 1024;

/// An opened EPUB archive, owned by a single conversion
pub struct EpubArchive<R> {
    zip: ZipArchive<R>,
    names: Vec<String>,
    entry_limit: u64,
}

impl EpubArchive<Cursor<Vec<u8>>> {
    /// Open an archive held in memory (uploads)
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }
}

impl<R: Read + Seek> EpubArchive<R> {
    /// Open an archive from any seekable reader
    pub fn from_reader(reader: R) -> Result<Self> {
        let zip = ZipArchive::new(reader).map_err(|e| EpubError::ArchiveInvalid(e.to_string()))?;
        let names = zip.file_names().map(str::to_string).collect();

        Ok(Self {
            zip,
            names,
            entry_limit: DEFAULT_ENTRY_LIMIT,
        })
    }

    /// Cap the uncompressed size of any single entry
    pub fn with_entry_limit(mut self, limit: u64) -> Self {
        self.entry_limit = limit;
        self
    }

    /// All entry names in central directory order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Find the stored entry name matching a normalized path
    pub fn find(&self, path: &str) -> Option<&str> {
        let wanted = normalize_entry_name(path);
        self.names
            .iter()
            .find(|name| normalize_entry_name(name) == wanted)
            .map(String::as_str)
    }

    /// Whether an entry exists for the given path
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Read an entry's raw bytes
    ///
    /// Entries that fail to inflate, fail their checksum or grow past the
    /// entry limit are reported as [`ArchiveError::Corrupt`].
    pub fn read(&mut self, path: &str) -> std::result::Result<Vec<u8>, ArchiveError> {
        let name = self
            .find(path)
            .ok_or_else(|| ArchiveError::NotFound(path.to_string()))?
            .to_string();

        let mut file = self.zip.by_name(&name).map_err(|e| match e {
            ZipError::FileNotFound => ArchiveError::NotFound(name.clone()),
            ZipError::Io(source) => ArchiveError::Read {
                name: name.clone(),
                source,
            },
            other => ArchiveError::Corrupt {
                name: name.clone(),
                reason: other.to_string(),
            },
        })?;

        let limit = self.entry_limit;
        if file.size() > limit {
            return Err(ArchiveError::Corrupt {
                reason: format!("declared size {} exceeds the {} byte limit", file.size(), limit),
                name,
            });
        }

        // Inflate and checksum failures mean damaged entry data
        let mut data = Vec::with_capacity(file.size() as usize);
        file.by_ref()
            .take(limit + 1)
            .read_to_end(&mut data)
            .map_err(|e| ArchiveError::Corrupt {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        if data.len() as u64 > limit {
            return Err(ArchiveError::Corrupt {
                reason: format!("inflates past the {} byte limit", limit),
                name,
            });
        }

        Ok(data)
    }

    /// Read an entry as UTF-8 text, dropping a leading byte-order mark
    pub fn read_text(&mut self, path: &str) -> std::result::Result<String, ArchiveError> {
        let data = self.read(path)?;
        let text = String::from_utf8(data).map_err(|_| ArchiveError::Encoding(path.to_string()))?;

        Ok(match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        })
    }
}

/// Directory part of an archive path ("" for entries at the root)
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve an href found in a document located in `base_dir`
///
/// - Strips the fragment ("chapter1.xhtml#s1" → "chapter1.xhtml")
/// - URL-decodes percent-encoded characters
/// - A leading "/" makes the href relative to the archive root
/// - Collapses "." and ".." segments
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let decoded = urlencoding::decode(href).unwrap_or_else(|_| href.into());
    let decoded = decoded.replace('\\', "/");

    let joined = if decoded.starts_with('/') || base_dir.is_empty() {
        decoded
    } else {
        format!("{}/{}", base_dir.trim_end_matches('/'), decoded)
    };

    normalize_entry_name(&joined)
}

/// Normalize an archive path: forward slashes, no "." segments, ".." resolved
fn normalize_entry_name(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::test_helpers::{corrupt_entry, varied_text, zip_bytes};

    #[test]
    fn test_resolve_href_relative_to_package_dir() {
        assert_eq!(resolve_href("OEBPS", "Text/ch1.xhtml"), "OEBPS/Text/ch1.xhtml");
        assert_eq!(resolve_href("", "ch1.xhtml"), "ch1.xhtml");
        assert_eq!(resolve_href("OEBPS/Text", "../Styles/a.css"), "OEBPS/Styles/a.css");
        assert_eq!(resolve_href("OEBPS", "./ch1.xhtml#sec2"), "OEBPS/ch1.xhtml");
    }

    #[test]
    fn test_resolve_href_decodes_and_handles_absolute() {
        assert_eq!(resolve_href("OEBPS", "chapter%201.xhtml"), "OEBPS/chapter 1.xhtml");
        assert_eq!(resolve_href("OEBPS", "/other/ch.xhtml"), "other/ch.xhtml");
        assert_eq!(resolve_href("OEBPS", "Text\\ch1.xhtml"), "OEBPS/Text/ch1.xhtml");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("OEBPS/content.opf"), "OEBPS");
        assert_eq!(parent_dir("content.opf"), "");
        assert_eq!(parent_dir("a/b/c.opf"), "a/b");
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let result = EpubArchive::from_bytes(b"definitely not a zip".to_vec());
        assert!(matches!(result, Err(EpubError::ArchiveInvalid(_))));
    }

    #[test]
    fn test_read_entries() {
        let data = zip_bytes(&[("a.txt", "alpha"), ("dir/b.txt", "\u{feff}beta")]);
        let mut archive = EpubArchive::from_bytes(data).unwrap();

        assert_eq!(archive.names().len(), 2);
        assert!(archive.contains("dir/b.txt"));
        assert!(archive.contains("./dir/b.txt"));
        assert_eq!(archive.read("a.txt").unwrap(), b"alpha");
        assert_eq!(archive.read_text("dir/b.txt").unwrap(), "beta");
    }

    #[test]
    fn test_read_missing_entry() {
        let data = zip_bytes(&[("a.txt", "alpha")]);
        let mut archive = EpubArchive::from_bytes(data).unwrap();

        assert!(matches!(archive.read("b.txt"), Err(ArchiveError::NotFound(name)) if name == "b.txt"));
    }

    #[test]
    fn test_corrupt_entry_data() {
        let text = varied_text(300);
        let data = corrupt_entry(zip_bytes(&[("a.txt", text.as_str())]), "a.txt");
        let mut archive = EpubArchive::from_bytes(data).unwrap();

        assert!(matches!(archive.read("a.txt"), Err(ArchiveError::Corrupt { .. })));
    }

    #[test]
    fn test_entry_limit() {
        let text = varied_text(300);
        let data = zip_bytes(&[("big.txt", text.as_str()), ("small.txt", "tiny")]);
        let mut archive = EpubArchive::from_bytes(data).unwrap().with_entry_limit(64);

        assert!(matches!(
            archive.read("big.txt"),
            Err(ArchiveError::Corrupt { name, .. }) if name == "big.txt"
        ));
        assert_eq!(archive.read("small.txt").unwrap(), b"tiny");
    }
}
