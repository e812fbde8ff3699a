use std::collections::{BTreeSet, HashMap};

use crate::normalize::char_len;

/// Upper bound on anchored windows evaluated by [`partial_ratio`].
const MAX_PARTIAL_CANDIDATES: usize = 24;

/// Normalized Levenshtein similarity in [0, 1].
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Best [`ratio`] of `needle` against equal-length windows of `haystack`.
/// Directional: a haystack shorter than the needle is compared whole, so a
/// short page contained in a long block earns no credit. Candidate windows
/// come from word-occurrence voting: every needle word found in the haystack
/// proposes the window start that would line the two occurrences up.
pub fn partial_ratio(needle: &str, haystack: &str) -> f64 {
    let needle_chars = needle.chars().collect::<Vec<char>>();
    let haystack_chars = haystack.chars().collect::<Vec<char>>();
    let width = needle_chars.len();

    if width == 0 {
        return if haystack_chars.is_empty() { 1.0 } else { 0.0 };
    }
    if haystack_chars.len() <= width {
        return ratio(needle, haystack);
    }
    if haystack.contains(needle) {
        return 1.0;
    }

    candidate_starts(&needle_chars, &haystack_chars)
        .into_iter()
        .map(|start| {
            let window = haystack_chars[start..start + width]
                .iter()
                .collect::<String>();
            ratio(needle, &window)
        })
        .fold(0.0, f64::max)
}

fn candidate_starts(needle: &[char], haystack: &[char]) -> Vec<usize> {
    let width = needle.len();
    let last_start = haystack.len() - width;

    let mut needle_words = HashMap::<String, Vec<usize>>::new();
    for (offset, word) in words_with_offsets(needle) {
        needle_words.entry(word).or_default().push(offset);
    }

    let mut votes = HashMap::<usize, usize>::new();
    for (hay_offset, word) in words_with_offsets(haystack) {
        let Some(needle_offsets) = needle_words.get(&word) else {
            continue;
        };
        for needle_offset in needle_offsets {
            let start = hay_offset.saturating_sub(*needle_offset).min(last_start);
            *votes.entry(start).or_insert(0) += 1;
        }
    }

    if votes.is_empty() {
        let slots = MAX_PARTIAL_CANDIDATES.min(last_start + 1);
        let stride = (last_start / slots.max(1)).max(1);
        return (0..slots)
            .map(|slot| (slot * stride).min(last_start))
            .collect::<BTreeSet<usize>>()
            .into_iter()
            .collect();
    }

    let mut ranked = votes.into_iter().collect::<Vec<(usize, usize)>>();
    ranked.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(&right.0)));
    ranked.truncate(MAX_PARTIAL_CANDIDATES);
    ranked.into_iter().map(|(start, _)| start).collect()
}

fn words_with_offsets(chars: &[char]) -> Vec<(usize, String)> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut current_start = 0usize;

    for (index, character) in chars.iter().enumerate() {
        if character.is_whitespace() {
            if !current.is_empty() {
                words.push((current_start, std::mem::take(&mut current)));
            }
            continue;
        }
        if current.is_empty() {
            current_start = index;
        }
        current.push(*character);
    }
    if !current.is_empty() {
        words.push((current_start, current));
    }

    words
}

/// Token-set similarity of `a` (the block) against `b` (the page): rewards
/// shared vocabulary regardless of order and repetition. Returns 1.0 only
/// when every token of `a` occurs in `b`.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a = a.split_whitespace().collect::<BTreeSet<&str>>();
    let tokens_b = b.split_whitespace().collect::<BTreeSet<&str>>();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).copied().collect::<Vec<&str>>();
    let only_a = tokens_a.difference(&tokens_b).copied().collect::<Vec<&str>>();
    let only_b = tokens_b.difference(&tokens_a).copied().collect::<Vec<&str>>();

    if !intersection.is_empty() && only_a.is_empty() {
        return 1.0;
    }

    let shared = intersection.join(" ");
    let rest_a = only_a.join(" ");
    let rest_b = only_b.join(" ");

    let shared_len = char_len(&shared);
    let with_a_len = joined_len(shared_len, char_len(&rest_a));
    let with_b_len = joined_len(shared_len, char_len(&rest_b));

    // `shared` is a prefix of both combined strings, so the edit distances
    // reduce to suffix lengths and to the distance between the differences.
    // Shared tokens are measured against the block side only.
    let shared_vs_a = prefix_similarity(shared_len, with_a_len);
    let a_vs_b =
        1.0 - strsim::levenshtein(&rest_a, &rest_b) as f64 / with_a_len.max(with_b_len) as f64;

    shared_vs_a.max(a_vs_b)
}

fn joined_len(shared_len: usize, rest_len: usize) -> usize {
    if shared_len == 0 || rest_len == 0 {
        shared_len + rest_len
    } else {
        shared_len + 1 + rest_len
    }
}

fn prefix_similarity(prefix_len: usize, total_len: usize) -> f64 {
    if prefix_len == 0 || total_len == 0 {
        return 0.0;
    }
    prefix_len as f64 / total_len as f64
}

/// Blend of substring-oriented and vocabulary-oriented evidence.
pub fn blended(needle: &str, haystack: &str) -> f64 {
    partial_ratio(needle, haystack).max(token_set_ratio(needle, haystack))
}
