use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::PageText;
use crate::normalize::normalize;

const MIN_RUNNING_LINE_PAGES: usize = 3;
const MAX_RUNNING_LINE_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusOptions {
    pub strip_running_lines: bool,
    pub merge_hyphenation: bool,
    pub strip_page_labels: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusStats {
    pub page_count: usize,
    pub empty_page_count: usize,
    pub header_lines_removed: usize,
    pub footer_lines_removed: usize,
    pub dehyphenation_merges: usize,
    pub page_labels_detected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PageCorpus {
    pages: Vec<PageText>,
    stats: CorpusStats,
}

impl PageCorpus {
    pub fn new<S: AsRef<str>>(raw_pages: &[S], options: &CorpusOptions) -> Self {
        let mut pages = raw_pages
            .iter()
            .map(|page| {
                page.as_ref()
                    .lines()
                    .map(ToOwned::to_owned)
                    .collect::<Vec<String>>()
            })
            .collect::<Vec<Vec<String>>>();
        let mut stats = CorpusStats {
            page_count: pages.len(),
            ..CorpusStats::default()
        };

        if options.strip_running_lines {
            let (headers, footers) = strip_running_lines(&mut pages);
            stats.header_lines_removed = headers;
            stats.footer_lines_removed = footers;
        }

        let labels = match LabelPatterns::compile() {
            Some(patterns) => pages
                .iter_mut()
                .map(|lines| patterns.take_label(lines, options.strip_page_labels))
                .collect::<Vec<Option<String>>>(),
            None => vec![None; pages.len()],
        };
        stats.page_labels_detected = labels.iter().filter(|label| label.is_some()).count();

        if options.merge_hyphenation {
            for lines in &mut pages {
                let (merged, merges) = merge_hyphenated_lines(std::mem::take(lines));
                *lines = merged;
                stats.dehyphenation_merges += merges;
            }
        }

        let pages = pages
            .into_iter()
            .zip(labels)
            .enumerate()
            .map(|(index, (lines, label))| {
                PageText::new((index + 1) as u32, normalize(&lines.join("\n")), label)
            })
            .collect::<Vec<PageText>>();
        stats.empty_page_count = pages
            .iter()
            .filter(|page| page.normalized_text.is_empty())
            .count();

        debug!(
            pages = stats.page_count,
            empty_pages = stats.empty_page_count,
            "page corpus normalized"
        );

        Self { pages, stats }
    }

    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    pub fn page(&self, page_number: u32) -> Option<&PageText> {
        let index = (page_number as usize).checked_sub(1)?;
        self.pages.get(index)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn stats(&self) -> &CorpusStats {
        &self.stats
    }
}

fn strip_running_lines(pages: &mut [Vec<String>]) -> (usize, usize) {
    let header_candidates = detect_repeated_edge_lines(pages, true);
    let footer_candidates = detect_repeated_edge_lines(pages, false);

    let mut header_removed = 0usize;
    let mut footer_removed = 0usize;

    for lines in pages.iter_mut() {
        if let Some(index) = lines.iter().position(|line| !line.trim().is_empty()) {
            let candidate = normalize_edge_line(&lines[index]);
            if header_candidates.contains(&candidate) {
                lines.remove(index);
                header_removed += 1;
            }
        }

        if let Some(index) = lines.iter().rposition(|line| !line.trim().is_empty()) {
            let candidate = normalize_edge_line(&lines[index]);
            if footer_candidates.contains(&candidate) {
                lines.remove(index);
                footer_removed += 1;
            }
        }
    }

    (header_removed, footer_removed)
}

fn detect_repeated_edge_lines(pages: &[Vec<String>], header: bool) -> HashSet<String> {
    let mut seen = HashMap::<String, usize>::new();
    for lines in pages {
        let mut nonempty = lines.iter().filter(|line| !line.trim().is_empty());
        let edge = if header {
            nonempty.next()
        } else {
            nonempty.next_back()
        };
        let key = edge.map(|line| normalize_edge_line(line)).unwrap_or_default();
        if key.is_empty() || key.chars().count() > MAX_RUNNING_LINE_CHARS {
            continue;
        }
        *seen.entry(key).or_default() += 1;
    }

    seen.into_iter()
        .filter(|(_, pages_seen)| *pages_seen >= MIN_RUNNING_LINE_PAGES)
        .map(|(line, _)| line)
        .collect()
}

fn normalize_edge_line(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

fn merge_hyphenated_lines(lines: Vec<String>) -> (Vec<String>, usize) {
    let mut merged = Vec::<String>::with_capacity(lines.len());
    let mut merges = 0usize;
    let mut pending: Option<String> = None;

    for line in lines {
        match pending.take() {
            Some(current) if should_merge_hyphenated_pair(&current, &line) => {
                pending = Some(format!(
                    "{}{}",
                    current.trim_end().trim_end_matches('-'),
                    line.trim_start()
                ));
                merges += 1;
            }
            Some(current) => {
                merged.push(current);
                pending = Some(line);
            }
            None => pending = Some(line),
        }
    }
    merged.extend(pending);

    (merged, merges)
}

fn should_merge_hyphenated_pair(current: &str, next: &str) -> bool {
    let left = current.trim_end();
    if !left.ends_with('-') {
        return false;
    }

    let starts_with_lowercase = next
        .trim_start()
        .chars()
        .next()
        .is_some_and(char::is_lowercase);
    if !starts_with_lowercase {
        return false;
    }

    left.trim_end_matches('-')
        .chars()
        .last()
        .is_some_and(char::is_alphabetic)
}

struct LabelPatterns {
    page: Regex,
    number: Regex,
    roman: Regex,
}

impl LabelPatterns {
    fn compile() -> Option<Self> {
        Some(Self {
            page: Regex::new(r"(?i)^page\s+([0-9ivxlcdm]+)$").ok()?,
            number: Regex::new(r"^([0-9]{1,4})$").ok()?,
            roman: Regex::new(r"(?i)^([ivxlcdm]{1,8})$").ok()?,
        })
    }

    /// Looks for a printed page label in the last five or first two
    /// non-empty lines; removes the label line when `strip` is set.
    fn take_label(&self, lines: &mut Vec<String>, strip: bool) -> Option<String> {
        let nonempty = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, _)| index)
            .collect::<Vec<usize>>();
        let candidates = nonempty
            .iter()
            .rev()
            .take(5)
            .chain(nonempty.iter().take(2))
            .copied()
            .collect::<Vec<usize>>();

        for index in candidates {
            if let Some(label) = self.label_of(&lines[index]) {
                if strip {
                    lines.remove(index);
                }
                return Some(label);
            }
        }

        None
    }

    fn label_of(&self, line: &str) -> Option<String> {
        let cleaned = line
            .chars()
            .filter(|character| character.is_ascii_alphanumeric() || character.is_whitespace())
            .collect::<String>();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return None;
        }

        if let Some(value) = self.page.captures(cleaned).and_then(|found| found.get(1)) {
            return Some(value.as_str().to_ascii_lowercase());
        }
        if let Some(value) = self.number.captures(cleaned).and_then(|found| found.get(1)) {
            return Some(value.as_str().to_string());
        }
        self.roman
            .captures(cleaned)
            .and_then(|found| found.get(1))
            .map(|value| value.as_str().to_ascii_lowercase())
    }
}

/// Splits `pdftotext`-style output on form feeds, dropping trailing blank pages.
pub fn split_form_feed_pages(raw: &str) -> Vec<String> {
    let mut pages = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect::<Vec<String>>();

    while pages.last().is_some_and(|page| page.trim().is_empty()) {
        pages.pop();
    }

    pages
}

pub fn load_form_feed_file(path: &Path) -> Result<Vec<String>> {
    let raw = crate::util::read_text_file(path)?;
    let pages = split_form_feed_pages(&raw);
    info!(path = %path.display(), pages = pages.len(), "loaded form-feed page file");
    Ok(pages)
}

/// Loads `page_<n>.txt` files ordered by `n`; numbering must run from 1
/// without gaps.
pub fn load_page_directory(dir: &Path) -> Result<Vec<String>> {
    let pattern =
        Regex::new(r"^page_(\d+)\.txt$").context("failed to compile page filename regex")?;

    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    let mut numbered = Vec::<(u32, PathBuf)>::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(captures) = pattern.captures(name) else {
            continue;
        };
        let number = captures
            .get(1)
            .map(|value| value.as_str())
            .context("missing page number capture")?
            .parse::<u32>()
            .with_context(|| format!("invalid page number in filename: {name}"))?;
        numbered.push((number, path));
    }

    numbered.sort_by_key(|(number, _)| *number);
    for (expected, (number, path)) in (1u32..).zip(&numbered) {
        if *number != expected {
            bail!(
                "page files in {} are not contiguous: expected page_{}.txt, found {}",
                dir.display(),
                expected,
                path.display()
            );
        }
    }

    let pages = numbered
        .iter()
        .map(|(_, path)| crate::util::read_text_file(path))
        .collect::<Result<Vec<String>>>()?;
    info!(dir = %dir.display(), pages = pages.len(), "loaded page directory");
    Ok(pages)
}

pub fn extract_pdf_pages(pdf_path: &Path) -> Result<Vec<String>> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let pages = split_form_feed_pages(&String::from_utf8_lossy(&output.stdout));
    info!(path = %pdf_path.display(), pages = pages.len(), "extracted pdf page text");
    Ok(pages)
}
