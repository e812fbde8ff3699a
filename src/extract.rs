use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{BlockKind, TextBlock};
use crate::normalize::{char_len, condense_whitespace};

const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, ul, ol, table";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Tried in order; the first match becomes the content root.
    pub root_selectors: Vec<String>,
    pub min_paragraph_chars: usize,
    pub min_table_chars: usize,
    /// Drop `[12]`-style citation and `[edit]` markers from block text.
    pub strip_reference_markers: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            root_selectors: [
                "div.mw-parser-output",
                "#mw-content-text",
                "#content",
                "main",
                "article",
                "body",
            ]
            .into_iter()
            .map(ToOwned::to_owned)
            .collect(),
            min_paragraph_chars: 10,
            min_table_chars: 20,
            strip_reference_markers: false,
        }
    }
}

/// Walks the content root in document order and emits the whitelisted
/// semantic blocks. Lists contribute one `ListItem` per direct `li` child;
/// anything nested inside an emitted list or table is not emitted again.
pub fn extract_blocks(html: &str, options: &ExtractOptions) -> Vec<TextBlock> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(BLOCK_SELECTOR) else {
        return Vec::new();
    };

    let root = find_content_root(&document, &options.root_selectors);
    if root.is_none() {
        warn!("no content root matched; walking whole document");
    }
    let elements = match root {
        Some(root) => root.select(&selector).collect::<Vec<ElementRef>>(),
        None => document.select(&selector).collect::<Vec<ElementRef>>(),
    };

    let markers = if options.strip_reference_markers {
        Regex::new(r"\[(?:\d+|[a-z]|edit|citation needed)\]").ok()
    } else {
        None
    };
    let clean = |raw: String| -> String {
        match &markers {
            Some(pattern) => pattern.replace_all(&raw, "").into_owned(),
            None => raw,
        }
    };

    let mut claimed = HashSet::new();
    let mut blocks = Vec::<TextBlock>::new();
    let mut push = |kind: BlockKind, text: String, raw_text: String| {
        let sequence_index = blocks.len();
        blocks.push(TextBlock {
            kind,
            text,
            raw_text,
            sequence_index,
        });
    };

    for element in elements {
        if element
            .ancestors()
            .any(|ancestor| claimed.contains(&ancestor.id()))
        {
            continue;
        }

        let tag = element.value().name();
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let raw = clean(element_text(&element));
                let text = condense_whitespace(&raw);
                if text.is_empty() {
                    continue;
                }
                let level = tag[1..].parse::<u8>().unwrap_or(1);
                push(BlockKind::Heading { level }, text, raw);
            }
            "p" => {
                let raw = clean(element_text(&element));
                let text = condense_whitespace(&raw);
                if char_len(&text) <= options.min_paragraph_chars {
                    continue;
                }
                push(BlockKind::Paragraph, text, raw);
            }
            "ul" | "ol" => {
                claimed.insert(element.id());
                let ordered = tag == "ol";
                let mut ordinal = element
                    .value()
                    .attr("start")
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(1);
                for item in element
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|child| child.value().name() == "li")
                {
                    let raw = clean(element_text(&item));
                    let text = condense_whitespace(&raw);
                    if text.is_empty() {
                        continue;
                    }
                    push(BlockKind::ListItem { ordered, ordinal }, text, raw);
                    ordinal += 1;
                }
            }
            "table" => {
                claimed.insert(element.id());
                let (text, raw) = table_text(&element);
                let text = condense_whitespace(&clean(text));
                if char_len(&text) <= options.min_table_chars {
                    continue;
                }
                push(BlockKind::Table, text, clean(raw));
            }
            _ => {}
        }
    }

    debug!(blocks = blocks.len(), "extracted semantic blocks");
    blocks
}

fn find_content_root<'a>(document: &'a Html, selectors: &[String]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|candidate| {
        let selector = Selector::parse(candidate).ok()?;
        document.select(&selector).next()
    })
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>()
}

/// Returns (match text, render text). Cells are space-separated for matching
/// and rendered one row per line with ` | ` between cells.
fn table_text(table: &ElementRef) -> (String, String) {
    let Ok(row_selector) = Selector::parse("tr") else {
        let text = element_text(table);
        return (text.clone(), text);
    };
    let Ok(cell_selector) = Selector::parse("th, td") else {
        let text = element_text(table);
        return (text.clone(), text);
    };

    let rows = table
        .select(&row_selector)
        .map(|row| {
            row.select(&cell_selector)
                .map(|cell| condense_whitespace(&element_text(&cell)))
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<String>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect::<Vec<Vec<String>>>();

    if rows.is_empty() {
        let text = element_text(table);
        return (text.clone(), text);
    }

    let text = rows
        .iter()
        .map(|cells| cells.join(" "))
        .collect::<Vec<String>>()
        .join(" ");
    let raw = rows
        .iter()
        .map(|cells| cells.join(" | "))
        .collect::<Vec<String>>()
        .join("\n");
    (text, raw)
}
