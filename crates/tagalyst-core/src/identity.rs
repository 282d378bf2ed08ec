//! Stable identity keys for threads and messages.
//!
//! Keys must be re-derivable: a key computed for unchanged content at one
//! render pass has to match the key computed at any later pass, so the hash
//! and the normalization below are the only sanctioned way to derive them.

use crate::constants::{KEY_TEXT_LIMIT, THREAD_STORAGE_PREFIX};
use crate::dom::{Document, NodeId};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Characters the host injects for layout that carry no content
fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// 32-bit FNV-1a over a stream of UTF-16 code units
fn fnv1a_units(units: impl IntoIterator<Item = u16>) -> u32 {
    units.into_iter().fold(FNV_OFFSET_BASIS, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

fn to_hex(hash: u32) -> String {
    format!("{:08x}", hash)
}

/// Hash text into an 8-char lowercase hex string.
pub fn hash(text: &str) -> String {
    to_hex(fnv1a_units(text.encode_utf16()))
}

/// Normalize text before hashing or matching.
///
/// Strips zero-width and BOM characters, collapses whitespace runs to a
/// single space and trims both ends.
///
/// # Examples
/// - `" a \n b\u{200B} "` -> `"a b"`
/// - `"\u{FEFF}hello\t\tworld"` -> `"hello world"`
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars().filter(|c| !is_zero_width(*c)) {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Content-derived key: capped normalized text plus the sibling index.
pub fn content_key(normalized_text: &str, sibling_index: usize) -> String {
    let suffix = format!("|{}", sibling_index);
    let units = normalized_text
        .encode_utf16()
        .take(KEY_TEXT_LIMIT)
        .chain(suffix.encode_utf16());
    to_hex(fnv1a_units(units))
}

/// Derive the storage key of a message node.
///
/// Prefers the host's native id attribute; otherwise hashes the node's
/// normalized text (capped) with its index among element siblings.
pub fn derive_message_key(doc: &Document, node: NodeId, native_id_attr: Option<&str>) -> String {
    if let Some(id) = native_id_attr
        .and_then(|attr| doc.attr(node, attr))
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        return id.to_string();
    }
    let text = normalize(&doc.text_content(node));
    content_key(&text, doc.sibling_index(node).unwrap_or(0))
}

/// Storage key of the per-thread metadata record
pub fn thread_storage_key(thread_id: &str) -> String {
    format!("{}{}", THREAD_STORAGE_PREFIX, thread_id)
}

/// Storage key of one message's metadata record
pub fn message_storage_key(thread_key: &str, message_key: &str) -> String {
    format!("{}:{}", thread_key, message_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_known_vectors() {
        // Reference FNV-1a 32-bit values (ASCII input = same UTF-16 units)
        assert_eq!(hash(""), "811c9dc5");
        assert_eq!(hash("a"), "e40c292c");
        assert_eq!(hash("foobar"), "bf9cf968");
    }

    #[test]
    fn test_hash_is_deterministic() {
        for s in ["", "hello", "héllo wörld", "🦀 crab"] {
            assert_eq!(hash(s), hash(s));
            assert_eq!(hash(s).len(), 8);
        }
    }

    #[test]
    fn test_hash_distinct_for_short_inputs() {
        let inputs: Vec<String> = (0..500).map(|i| format!("message {}", i)).collect();
        let hashes: HashSet<String> = inputs.iter().map(|s| hash(s)).collect();
        assert_eq!(hashes.len(), inputs.len());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(" a \n b\u{200B} "), "a b");
        assert_eq!(normalize("\u{FEFF}hello\t\tworld"), "hello world");
        assert_eq!(normalize("a\u{200B}b"), "ab");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_content_key_disambiguates_siblings() {
        let text = "same leading text";
        assert_ne!(content_key(text, 0), content_key(text, 1));
        assert_eq!(content_key(text, 3), content_key(text, 3));
    }

    #[test]
    fn test_content_key_caps_text() {
        let base = "x".repeat(KEY_TEXT_LIMIT);
        let longer = format!("{}tail that is ignored", base);
        assert_eq!(content_key(&base, 0), content_key(&longer, 0));
    }

    #[test]
    fn test_content_key_ignores_injected_siblings() {
        let mut doc = Document::new();
        let body = doc.body();
        let message = doc.create_element("div");
        let text = doc.create_text("a message without a native id");
        doc.append_child(message, text).unwrap();
        doc.append_child(body, message).unwrap();
        let before = derive_message_key(&doc, message, Some("data-message-id"));

        let header = crate::ui::create_affordance(&mut doc, "header", "header").unwrap();
        doc.prepend_child(body, header).unwrap();
        assert_eq!(derive_message_key(&doc, message, Some("data-message-id")), before);
    }

    #[test]
    fn test_storage_keys() {
        assert_eq!(thread_storage_key("abc"), "__tagalyst_thread__abc");
        assert_eq!(message_storage_key("t1", "m1"), "t1:m1");
    }
}
