//! HTML processing module
//!
//! Markup helpers used around the chapter splitter:
//!
//! - [`normalize_entities`]: makes XHTML with HTML named entities parse as XML
//! - [`MarkupConverter`]: optional post-processing of finished chapters
//!   ([`PlainTextConverter`], [`CommandConverter`])
//!
//! Converters run after splitting. A converter failure leaves that chapter's
//! markup in place and never changes chapter boundaries.

mod command;
mod entities;
mod text;

use async_trait::async_trait;
use thiserror::Error;

use crate::epub::Chapter;

pub use command::CommandConverter;
pub use entities::normalize_entities;
pub use text::PlainTextConverter;

/// Errors from a markup converter
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Converter command failed: {0}")]
    Command(String),

    #[error("Converter produced invalid UTF-8")]
    InvalidOutput,

    #[error("Converter timed out after {0} seconds")]
    Timeout(u64),
}

/// Transforms chapter markup into another text format
#[async_trait]
pub trait MarkupConverter: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn convert(&self, markup: &str) -> Result<String, ConvertError>;
}

/// Apply a converter to every chapter, keeping markup where it fails
pub async fn convert_chapters(
    converter: &dyn MarkupConverter,
    chapters: Vec<Chapter>,
) -> Vec<Chapter> {
    let mut converted = Vec::with_capacity(chapters.len());

    for (index, chapter) in chapters.into_iter().enumerate() {
        match converter.convert(&chapter.text).await {
            Ok(text) => converted.push(Chapter { text, ..chapter }),
            Err(e) => {
                tracing::warn!(
                    converter = converter.name(),
                    chapter = index,
                    error = %e,
                    "Chapter conversion failed, keeping markup"
                );
                converted.push(chapter);
            }
        }
    }

    converted
}
