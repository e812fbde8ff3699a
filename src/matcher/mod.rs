//! Block-to-page alignment.
//!
//! Each block is scored independently against the whole page corpus, so the
//! per-block loop fans out over rayon and the collected output keeps input
//! order. Blocks whose text repeats verbatim on several pages bind to the
//! earliest one.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::PageCorpus;
use crate::model::{Match, MatchMethod, PageAssignment, PageText, TextBlock};
use crate::normalize::{char_len, char_prefix, find_char_offset, normalize};

pub mod similarity;
#[cfg(test)]
mod tests;

use similarity::blended;

/// One prefix length of the block text scored against a page, with its
/// weight. `chars: None` means the full text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrefixWindow {
    pub chars: Option<usize>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub substring_short_circuit: bool,
    pub min_block_length: usize,
    pub page_threshold: f64,
    pub localization_threshold: f64,
    pub window_step: usize,
    pub exact_prefix_chars: usize,
    pub window_padding: usize,
    pub min_prefix_length: usize,
    pub prefixes: Vec<PrefixWindow>,
    pub parallel: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            substring_short_circuit: true,
            min_block_length: 5,
            page_threshold: 0.6,
            localization_threshold: 0.5,
            window_step: 20,
            exact_prefix_chars: 50,
            window_padding: 100,
            min_prefix_length: 10,
            prefixes: vec![
                PrefixWindow {
                    chars: Some(100),
                    weight: 1.0,
                },
                PrefixWindow {
                    chars: Some(200),
                    weight: 0.95,
                },
                PrefixWindow {
                    chars: None,
                    weight: 0.9,
                },
            ],
            parallel: true,
        }
    }
}

impl MatchConfig {
    /// Clamps thresholds and weights into [0, 1] and step sizes to >= 1.
    pub fn validated(mut self) -> Self {
        self.page_threshold = clamp_unit(self.page_threshold);
        self.localization_threshold = clamp_unit(self.localization_threshold);
        self.window_step = self.window_step.max(1);
        self.exact_prefix_chars = self.exact_prefix_chars.max(1);
        for prefix in &mut self.prefixes {
            prefix.weight = clamp_unit(prefix.weight);
        }
        if self.prefixes.is_empty() {
            self.prefixes = Self::default().prefixes;
        }
        self
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Coverage counters over one run's matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchSummary {
    pub attempted: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub exact: usize,
    pub fuzzy: usize,
    pub below_threshold: usize,
    pub too_short: usize,
    pub no_pages: usize,
    pub localized: usize,
    pub mean_confidence: f64,
}

impl MatchSummary {
    pub fn from_matches(matches: &[Match]) -> Self {
        let mut summary = Self {
            attempted: matches.len(),
            ..Self::default()
        };
        let mut confidence_total = 0.0;

        for found in matches {
            match found.method {
                MatchMethod::Exact => summary.exact += 1,
                MatchMethod::Fuzzy => summary.fuzzy += 1,
                MatchMethod::BelowThreshold => summary.below_threshold += 1,
                MatchMethod::TooShort => summary.too_short += 1,
                MatchMethod::NoPages => summary.no_pages += 1,
            }
            if found.assigned_page.is_matched() {
                summary.matched += 1;
                confidence_total += found.confidence;
                if found.intra_page_offset.is_some() {
                    summary.localized += 1;
                }
            } else {
                summary.unmatched += 1;
            }
        }

        if summary.matched > 0 {
            summary.mean_confidence = confidence_total / summary.matched as f64;
        }
        summary
    }

    pub fn coverage(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.matched as f64 / self.attempted as f64
    }
}

pub struct Matcher {
    config: MatchConfig,
}

impl Matcher {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// One `Match` per input block, in input order.
    pub fn match_blocks(&self, blocks: &[TextBlock], corpus: &PageCorpus) -> Vec<Match> {
        if self.config.parallel {
            blocks
                .par_iter()
                .map(|block| self.match_block(block, corpus))
                .collect()
        } else {
            blocks
                .iter()
                .map(|block| self.match_block(block, corpus))
                .collect()
        }
    }

    pub fn match_block(&self, block: &TextBlock, corpus: &PageCorpus) -> Match {
        let text = normalize(&block.text);
        let block_ref = block.sequence_index;

        if char_len(&text) < self.config.min_block_length {
            debug!(block = block_ref, "block below minimum length; skipped");
            return Match::unmatched(block_ref, MatchMethod::TooShort);
        }
        if corpus.is_empty() {
            return Match::unmatched(block_ref, MatchMethod::NoPages);
        }

        if self.config.substring_short_circuit {
            let head = char_prefix(&text, self.config.exact_prefix_chars);
            for page in corpus.pages() {
                if let Some(offset) = find_char_offset(&page.normalized_text, head) {
                    debug!(block = block_ref, page = page.page_number, offset, "exact prefix match");
                    return Match {
                        block_ref,
                        assigned_page: PageAssignment::Page(page.page_number),
                        confidence: 1.0,
                        intra_page_offset: Some(offset),
                        method: MatchMethod::Exact,
                        best_candidate: None,
                    };
                }
            }
        }

        let scores = if self.config.parallel {
            corpus
                .pages()
                .par_iter()
                .map(|page| self.score(&text, &page.normalized_text))
                .collect::<Vec<f64>>()
        } else {
            corpus
                .pages()
                .iter()
                .map(|page| self.score(&text, &page.normalized_text))
                .collect::<Vec<f64>>()
        };

        // Strictly greater keeps the earliest page on ties.
        let mut best_index = 0usize;
        for (index, score) in scores.iter().enumerate().skip(1) {
            if *score > scores[best_index] {
                best_index = index;
            }
        }
        let page = &corpus.pages()[best_index];
        let confidence = scores[best_index].min(1.0);

        if confidence < self.config.page_threshold {
            debug!(
                block = block_ref,
                best_page = page.page_number,
                score = confidence,
                "no page cleared threshold"
            );
            return Match {
                confidence,
                best_candidate: Some(page.page_number),
                ..Match::unmatched(block_ref, MatchMethod::BelowThreshold)
            };
        }

        let offset = self.localize(&text, page);
        debug!(
            block = block_ref,
            page = page.page_number,
            score = confidence,
            offset = ?offset,
            "fuzzy page match"
        );

        Match {
            block_ref,
            assigned_page: PageAssignment::Page(page.page_number),
            confidence,
            intra_page_offset: offset,
            method: MatchMethod::Fuzzy,
            best_candidate: None,
        }
    }

    /// Max over prefix windows of `blended(prefix, target) * weight`.
    /// Truncated prefixes below `min_prefix_length` are skipped; a window
    /// covering the whole block is always scored.
    fn score(&self, text: &str, target: &str) -> f64 {
        let mut best = 0.0f64;
        let mut previous: Option<(&str, f64)> = None;

        for prefix in &self.config.prefixes {
            let chunk = match prefix.chars {
                Some(limit) => char_prefix(text, limit),
                None => text,
            };
            let truncated = chunk.len() < text.len();
            if truncated && char_len(chunk.trim()) < self.config.min_prefix_length {
                continue;
            }

            let similarity = match previous {
                Some((seen, value)) if seen == chunk => value,
                _ => blended(chunk, target),
            };
            previous = Some((chunk, similarity));
            best = best.max(similarity * prefix.weight);
        }

        best
    }

    /// Coarse sliding-window scan for the block's start on its page.
    fn localize(&self, text: &str, page: &PageText) -> Option<usize> {
        let chars = page.chars();
        if chars.is_empty() {
            return None;
        }

        let length = char_len(text);
        let window = (length + self.config.window_padding).min(chars.len());
        let step = self.config.window_step.max(length / 4).max(1);

        let mut starts = (0..=chars.len() - window).step_by(step).collect::<Vec<usize>>();
        let tail_start = chars.len() - window;
        if starts.last().is_some_and(|last| *last < tail_start) {
            starts.push(tail_start);
        }

        let mut best: Option<(usize, f64)> = None;
        for start in starts {
            let slice = chars[start..start + window].iter().collect::<String>();
            let score = self.score(text, &slice);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((start, score));
            }
        }

        best.filter(|(_, score)| score.min(1.0) >= self.config.localization_threshold)
            .map(|(start, _)| start)
    }
}
