//! Named entity normalization
//!
//! EPUB content documents are XHTML and should parse as XML, but many books
//! still use HTML named entities (`&nbsp;`, `&mdash;`) that an XML parser
//! without the XHTML DTD rejects. Rewriting them as numeric character
//! references keeps the markup equivalent while making it well-formed.

use std::borrow::Cow;
use std::fmt::Write;

/// Entities every XML parser knows
const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];

/// Longest entity name worth looking up
const MAX_ENTITY_LEN: usize = 32;

/// Rewrite named HTML entities as numeric references
///
/// The five predefined XML entities, numeric references and unknown names
/// are left untouched.
pub fn normalize_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut changed = false;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        match named_entity(after) {
            Some(name) => {
                match numeric_reference(name) {
                    Some(reference) => {
                        out.push_str(&reference);
                        changed = true;
                    }
                    None => {
                        out.push('&');
                        out.push_str(name);
                        out.push(';');
                    }
                }
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(text)
    }
}

/// Entity name at the start of `text` (text following an '&'), if any
fn named_entity(text: &str) -> Option<&str> {
    let end = text.char_indices().take(MAX_ENTITY_LEN + 1).find(|(_, c)| *c == ';')?.0;
    let name = &text[..end];

    let mut chars = name.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric()) {
        Some(name)
    } else {
        None
    }
}

fn numeric_reference(name: &str) -> Option<String> {
    if XML_ENTITIES.contains(&name) {
        return None;
    }

    let entity = format!("&{};", name);
    let decoded = html_escape::decode_html_entities(&entity);
    // Legacy names decode without the ';', leaving a partial match behind
    if decoded == entity.as_str() || decoded.contains(';') {
        return None;
    }

    let mut reference = String::new();
    for c in decoded.chars() {
        let _ = write!(reference, "&#x{:X};", c as u32);
    }
    Some(reference)
}
