//! Plain text converter
//!
//! Turns chapter markup into readable text: one line per block element,
//! entities decoded, whitespace collapsed.

use async_trait::async_trait;
use regex::Regex;

use super::{ConvertError, MarkupConverter};

/// Markup → plain text, built on regular expressions
#[derive(Debug, Clone)]
pub struct PlainTextConverter {
    hidden: Regex,
    block_boundary: Regex,
    tag: Regex,
}

impl PlainTextConverter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            hidden: Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>")?,
            block_boundary: Regex::new(
                r"(?i)</?(?:p|div|section|article|aside|header|footer|main|blockquote|pre|h[1-6]|ul|ol|dl|li|dt|dd|table|tr|figure|figcaption)\b[^>]*>|<br\s*/?>",
            )?,
            tag: Regex::new(r"<[^>]+>")?,
        })
    }

    /// Convert synchronously
    pub fn to_text(&self, markup: &str) -> String {
        let visible = self.hidden.replace_all(markup, "");
        let broken = self.block_boundary.replace_all(&visible, "\n");
        let stripped = self.tag.replace_all(&broken, "");
        let decoded = html_escape::decode_html_entities(&stripped);

        decoded
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl MarkupConverter for PlainTextConverter {
    fn name(&self) -> &str {
        "text"
    }

    async fn convert(&self, markup: &str) -> Result<String, ConvertError> {
        Ok(self.to_text(markup))
    }
}
