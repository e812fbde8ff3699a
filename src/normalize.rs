//! Shared text normalization. Every comparison in the engine runs over
//! strings produced by [`normalize`]; lengths and offsets are in chars.

use unicode_normalization::UnicodeNormalization;

/// NFKD-decompose, collapse whitespace runs to one ASCII space, trim.
pub fn normalize(text: &str) -> String {
    let decomposed = text.nfkd().collect::<String>();
    condense_whitespace(&decomposed)
}

pub fn condense_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Char offset of the first occurrence of `needle` in `haystack`.
pub fn find_char_offset(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte_index| haystack[..byte_index].chars().count())
}
