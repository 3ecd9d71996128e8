//! EPUB data types
//!
//! Core types shared by the parsing stages and the chapter splitter.

use std::collections::HashMap;

use serde::Serialize;

/// Manifest item from the package document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Href relative to the package document
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    /// Whether the space-separated `properties` attribute contains `name`
    pub fn has_property(&self, name: &str) -> bool {
        self.properties
            .as_deref()
            .map(|props| props.split_whitespace().any(|p| p == name))
            .unwrap_or(false)
    }
}

/// Id-keyed registry of package files, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    items: Vec<ManifestItem>,
    by_id: HashMap<String, usize>,
}

impl Manifest {
    /// Insert an item; returns false (and keeps the first) if the id is taken
    pub fn insert(&mut self, item: ManifestItem) -> bool {
        if self.by_id.contains_key(&item.id) {
            return false;
        }
        self.by_id.insert(item.id.clone(), self.items.len());
        self.items.push(item);
        true
    }

    pub fn get(&self, id: &str) -> Option<&ManifestItem> {
        self.by_id.get(id).map(|&index| &self.items[index])
    }

    pub fn items(&self) -> &[ManifestItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Reading-order reference into the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineEntry {
    pub idref: String,
}

/// Parsed package document
#[derive(Debug, Clone)]
pub struct Package {
    /// Archive path of the package document
    pub path: String,
    /// Directory all manifest hrefs are relative to
    pub base_dir: String,
    pub manifest: Manifest,
    pub spine: Vec<SpineEntry>,
    /// Manifest id named by the spine's `toc` attribute (EPUB 2)
    pub toc_id: Option<String>,
}

/// Where a navigation entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// An element id inside some content document
    ElementId(String),
    /// The whole referenced content document is one chapter
    WholeDocument,
}

impl Anchor {
    /// Extract the anchor from a navigation reference (`file#id` or `file`)
    pub fn from_href(href: &str) -> Self {
        match href.split_once('#') {
            Some((_, fragment)) if !fragment.is_empty() => {
                let id = urlencoding::decode(fragment)
                    .map(|id| id.into_owned())
                    .unwrap_or_else(|_| fragment.to_string());
                Anchor::ElementId(id)
            }
            _ => Anchor::WholeDocument,
        }
    }

    pub fn element_id(&self) -> Option<&str> {
        match self {
            Anchor::ElementId(id) => Some(id),
            Anchor::WholeDocument => None,
        }
    }
}

/// Table of contents entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub label: String,
    pub anchor: Anchor,
}

impl NavEntry {
    pub fn new(label: impl Into<String>, href: &str) -> Self {
        Self {
            label: label.into(),
            anchor: Anchor::from_href(href),
        }
    }
}

/// A finished chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    /// Label of the navigation entry that opened the chapter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Markup of the chapter's structural elements, one per line
    ///
    /// Named HTML entities appear as numeric character references
    /// (`&nbsp;` → `&#xA0;`); the markup is otherwise copied verbatim.
    pub text: String,
}

/// Result of converting one EPUB
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub chapters: Vec<Chapter>,
    /// Navigation labels, absent when no navigation document could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toc: Option<Vec<String>>,
}
