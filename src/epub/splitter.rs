//! Chapter splitter
//!
//! Walks the spine in reading order and cuts the stream of content documents
//! into chapters at the navigation anchors.
//!
//! # Cursor model
//!
//! Navigation entries are consumed strictly in order. [`SplitState`] records
//! the index of the next entry to consume and the chapter currently open;
//! it is passed into [`Splitter::split_document`] and handed back with the
//! chapters finished inside that document, so every document step can be
//! exercised on its own.
//!
//! # Boundaries
//!
//! - An entry whose anchor is [`Anchor::WholeDocument`] opens a chapter at the
//!   start of the next content document and closes it at that document's end.
//!   Anchors inside such a document are not looked at.
//! - An [`Anchor::ElementId`] entry opens a chapter at the first element
//!   carrying that id. An id on an inline element moves the boundary up to
//!   its nearest structural ancestor, so blocks are never cut in half.
//!   An id on `<body>` or `<html>` puts the boundary at the start of the body.
//! - While a chapter is open, structural elements are copied verbatim from
//!   the source, one per line. A structural element with the next anchor
//!   somewhere deeper inside is entered rather than copied; its text and
//!   non-structural children are then copied one per line as well, on
//!   whichever side of the boundary they fall.
//! - Markup is copied from the entity-normalized source, so named entities
//!   such as `&nbsp;` come out as numeric references (`&#xA0;`).
//!
//! Without navigation every content document becomes its own chapter.

use std::io::{Read, Seek};

use roxmltree::{Document, Node, ParsingOptions};

use super::archive::{resolve_href, EpubArchive};
use super::types::{Anchor, Chapter, NavEntry, Package};
use crate::html::normalize_entities;

/// Elements copied into chapters as whole units
const STRUCTURAL_ELEMENTS: [&str; 21] = [
    "p", "div", "section", "article", "aside", "header", "footer", "main", "blockquote", "pre",
    "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "dl", "table", "figure",
];

fn is_structural(node: Node) -> bool {
    node.is_element() && STRUCTURAL_ELEMENTS.contains(&node.tag_name().name())
}

/// Parse a content document into a tree
///
/// Named HTML entities should already be rewritten (see
/// [`normalize_entities`]); DTDs are allowed since most XHTML carries one.
pub fn parse_content(text: &str) -> Result<Document<'_>, roxmltree::Error> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options)
}

/// Chapter being accumulated
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenChapter {
    title: Option<String>,
    whole_document: bool,
    text: String,
}

/// Navigation cursor threaded through the spine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitState {
    next: usize,
    open: Option<OpenChapter>,
}

impl SplitState {
    /// Index of the next navigation entry to consume
    pub fn next_entry(&self) -> usize {
        self.next
    }

    /// Whether a chapter is currently collecting content
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

/// Where the pending anchor sits relative to a visited element
enum Location {
    /// The boundary falls right before this element
    Here,
    /// Deeper inside; descend to find it
    Inside,
    /// Not in this subtree
    Elsewhere,
}

/// Splits content documents against a navigation list
pub struct Splitter<'a> {
    nav: &'a [NavEntry],
}

impl<'a> Splitter<'a> {
    pub fn new(nav: &'a [NavEntry]) -> Self {
        Self { nav }
    }

    /// Anchor of the next unconsumed entry
    ///
    /// An empty navigation list behaves like an endless run of whole-document
    /// entries.
    fn upcoming(&self, state: &SplitState) -> Option<&'a Anchor> {
        if self.nav.is_empty() {
            return Some(&Anchor::WholeDocument);
        }
        self.nav.get(state.next).map(|entry| &entry.anchor)
    }

    /// Process one parsed content document
    pub fn split_document(&self, state: SplitState, doc: &Document) -> (SplitState, Vec<Chapter>) {
        let mut walk = Walk {
            splitter: self,
            state,
            chapters: Vec::new(),
            source: doc.input_text(),
        };

        if matches!(walk.upcoming(), Some(Anchor::WholeDocument)) {
            walk.close();
            walk.open_next(true);
        }

        let root = doc.root_element();
        let body = root
            .descendants()
            .find(|n| n.has_tag_name("body"))
            .unwrap_or(root);

        // Ids on <html>/<body> open a chapter covering the whole body
        let mut wrappers: Vec<Node> = body.ancestors().filter(Node::is_element).collect();
        wrappers.reverse();
        for wrapper in wrappers {
            while let Some(anchor) = walk.pending_anchor() {
                if wrapper.attribute("id") != Some(anchor) {
                    break;
                }
                walk.boundary(anchor);
            }
        }

        for child in body.children().filter(Node::is_element) {
            walk.visit(child, false);
        }

        if walk.state.open.as_ref().is_some_and(|open| open.whole_document) {
            walk.close();
        }

        (walk.state, walk.chapters)
    }

    /// Close whatever is still open once the spine is exhausted
    pub fn finish(&self, state: SplitState) -> Vec<Chapter> {
        state
            .open
            .filter(|open| open.whole_document || !open.text.is_empty())
            .map(|open| Chapter {
                title: open.title,
                text: open.text,
            })
            .into_iter()
            .collect()
    }
}

/// Traversal of a single document
struct Walk<'s, 'a> {
    splitter: &'s Splitter<'a>,
    state: SplitState,
    chapters: Vec<Chapter>,
    source: &'s str,
}

impl<'s, 'a> Walk<'s, 'a> {
    fn upcoming(&self) -> Option<&'a Anchor> {
        self.splitter.upcoming(&self.state)
    }

    /// Element id to look for, if boundaries can occur right now
    fn pending_anchor(&self) -> Option<&'a str> {
        if self.state.open.as_ref().is_some_and(|open| open.whole_document) {
            return None;
        }
        self.upcoming().and_then(Anchor::element_id)
    }

    fn open_next(&mut self, whole_document: bool) {
        let title = self
            .splitter
            .nav
            .get(self.state.next)
            .map(|entry| entry.label.clone());
        self.state.next += 1;
        self.state.open = Some(OpenChapter {
            title,
            whole_document,
            text: String::new(),
        });
    }

    /// Finalize the open chapter; empty anchor chapters are dropped
    fn close(&mut self) {
        if let Some(open) = self.state.open.take() {
            if open.whole_document || !open.text.is_empty() {
                self.chapters.push(Chapter {
                    title: open.title,
                    text: open.text,
                });
            }
        }
    }

    fn boundary(&mut self, anchor: &str) {
        tracing::trace!(anchor, "Chapter boundary");
        self.close();
        self.open_next(false);
    }

    /// Append one line of source markup to the open chapter
    fn copy(&mut self, node: Node) {
        if let Some(open) = self.state.open.as_mut() {
            let markup = self.source[node.range()].trim();
            if !markup.is_empty() {
                open.text.push_str(markup);
                open.text.push('\n');
            }
        }
    }

    /// Visit an element
    ///
    /// `in_block` is set for children of a structural element that had to be
    /// opened up; those are copied whole, text and inline markup included.
    fn visit(&mut self, node: Node, in_block: bool) {
        while let Some(anchor) = self.pending_anchor() {
            match locate(node, anchor) {
                Location::Here => self.boundary(anchor),
                Location::Inside => {
                    if in_block || is_structural(node) {
                        self.descend_block(node);
                    } else {
                        self.descend(node);
                    }
                    return;
                }
                Location::Elsewhere => break,
            }
        }

        if in_block || is_structural(node) {
            self.copy(node);
        } else {
            self.descend(node);
        }
    }

    fn descend(&mut self, node: Node) {
        for child in node.children().filter(Node::is_element) {
            self.visit(child, false);
        }
    }

    fn descend_block(&mut self, node: Node) {
        for child in node.children() {
            if child.is_element() {
                self.visit(child, true);
            } else if child.is_text() {
                self.copy(child);
            }
        }
    }
}

/// Find the first element with `id == anchor` in `node`'s subtree
fn locate(node: Node, anchor: &str) -> Location {
    let Some(target) = node
        .descendants()
        .find(|n| n.is_element() && n.attribute("id") == Some(anchor))
    else {
        return Location::Elsewhere;
    };

    if target == node {
        return Location::Here;
    }

    // A structural element between the target and `node` takes the boundary
    let mut current = Some(target);
    while let Some(el) = current.filter(|el| *el != node) {
        if is_structural(el) {
            return Location::Inside;
        }
        current = el.parent_element();
    }

    if is_structural(node) {
        Location::Here
    } else {
        Location::Inside
    }
}

/// Split every spine document of a book into chapters
///
/// Unresolvable spine entries, missing files and documents that fail to
/// parse are logged and skipped; they never abort the conversion.
pub fn split_book<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    package: &Package,
    nav: &[NavEntry],
) -> Vec<Chapter> {
    let splitter = Splitter::new(nav);
    let mut state = SplitState::default();
    let mut chapters = Vec::new();

    for (index, entry) in package.spine.iter().enumerate() {
        let Some(item) = package.manifest.get(&entry.idref) else {
            tracing::warn!(idref = %entry.idref, index, "Spine item not found in manifest");
            continue;
        };

        let path = resolve_href(&package.base_dir, &item.href);
        let markup = match archive.read_text(&path) {
            Ok(markup) => markup,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Skipping unreadable content document");
                continue;
            }
        };

        let text = normalize_entities(&markup);
        let doc = match parse_content(&text) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Skipping malformed content document");
                continue;
            }
        };

        let (next_state, finished) = splitter.split_document(state, &doc);
        state = next_state;

        tracing::debug!(
            path = %path,
            finished = finished.len(),
            next_entry = state.next_entry(),
            "Processed content document"
        );
        chapters.extend(finished);
    }

    chapters.extend(splitter.finish(state));

    if !nav.is_empty() && chapters.len() != nav.len() {
        tracing::info!(
            chapters = chapters.len(),
            nav_entries = nav.len(),
            "Chapter count differs from navigation entries"
        );
    }

    chapters
}
