use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::cli::OutputFormat;
use crate::model::{BlockKind, Match, TextBlock};

#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
    pub format: OutputFormat,
    pub include_page_title: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Markdown,
            include_page_title: true,
        }
    }
}

/// Matched blocks sharing one page, in reading order.
#[derive(Debug)]
pub struct PageBundle<'a> {
    pub page_number: u32,
    pub entries: Vec<(&'a TextBlock, &'a Match)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub pages: BTreeMap<u32, String>,
    pub combined: String,
}

/// Groups matched blocks by page and orders each group by
/// `(intra_page_offset, sequence_index)`, with unknown offsets last.
pub fn bundle_pages<'a>(blocks: &'a [TextBlock], matches: &'a [Match]) -> Vec<PageBundle<'a>> {
    let by_index = blocks
        .iter()
        .map(|block| (block.sequence_index, block))
        .collect::<HashMap<usize, &TextBlock>>();

    let mut grouped = BTreeMap::<u32, Vec<(&TextBlock, &Match)>>::new();
    for found in matches {
        let Some(page_number) = found.assigned_page.page_number() else {
            continue;
        };
        let Some(block) = by_index.get(&found.block_ref).copied() else {
            warn!(block = found.block_ref, "match refers to unknown block; skipped");
            continue;
        };
        grouped.entry(page_number).or_default().push((block, found));
    }

    grouped
        .into_iter()
        .map(|(page_number, mut entries)| {
            entries.sort_by_key(|(block, found)| {
                (
                    found.intra_page_offset.unwrap_or(usize::MAX),
                    block.sequence_index,
                )
            });
            PageBundle {
                page_number,
                entries,
            }
        })
        .collect()
}

pub fn assemble(blocks: &[TextBlock], matches: &[Match], options: &AssembleOptions) -> Assembly {
    let pages = bundle_pages(blocks, matches)
        .iter()
        .map(|bundle| (bundle.page_number, render_page(bundle, options)))
        .collect::<BTreeMap<u32, String>>();

    let separator = options.format.page_separator();
    let combined = pages
        .values()
        .map(|content| format!("{content}{separator}"))
        .collect::<String>();

    Assembly { pages, combined }
}

pub fn render_page(bundle: &PageBundle, options: &AssembleOptions) -> String {
    match options.format {
        OutputFormat::Markdown => render_markdown(bundle, options.include_page_title),
        OutputFormat::Html => render_html(bundle, options.include_page_title),
    }
}

/// Level 1 is reserved for the page title.
fn heading_depth(level: u8) -> usize {
    (usize::from(level) + 1).min(6)
}

fn render_markdown(bundle: &PageBundle, include_title: bool) -> String {
    let mut lines = Vec::<String>::new();
    if include_title {
        lines.push(format!("# Page {}", bundle.page_number));
        lines.push(String::new());
    }

    let mut entries = bundle.entries.iter().peekable();
    while let Some((block, _)) = entries.next() {
        match block.kind {
            BlockKind::Heading { level } => {
                lines.push(format!("{} {}", "#".repeat(heading_depth(level)), block.text));
                lines.push(String::new());
            }
            BlockKind::Paragraph => {
                lines.push(verbatim_body(block));
                lines.push(String::new());
            }
            BlockKind::ListItem { ordered, ordinal } => {
                if ordered {
                    lines.push(format!("{ordinal}. {}", block.text));
                } else {
                    lines.push(format!("- {}", block.text));
                }
                let list_continues = entries
                    .peek()
                    .is_some_and(|(next, _)| matches!(next.kind, BlockKind::ListItem { .. }));
                if !list_continues {
                    lines.push(String::new());
                }
            }
            BlockKind::Table => {
                lines.push("```".to_string());
                lines.push(verbatim_body(block));
                lines.push("```".to_string());
                lines.push(String::new());
            }
        }
    }

    lines.join("\n")
}

fn render_html(bundle: &PageBundle, include_title: bool) -> String {
    let mut lines = Vec::<String>::new();
    if include_title {
        lines.push(format!("<h1>Page {}</h1>", bundle.page_number));
    }

    // Some(ordered) while a list element is open.
    let mut open_list: Option<bool> = None;
    for (block, _) in &bundle.entries {
        if let BlockKind::ListItem { ordered, ordinal } = block.kind {
            if open_list != Some(ordered) {
                close_list(&mut lines, &mut open_list);
                if ordered {
                    lines.push(format!("<ol start=\"{ordinal}\">"));
                } else {
                    lines.push("<ul>".to_string());
                }
                open_list = Some(ordered);
            }
            lines.push(format!("<li>{}</li>", escape_html(&block.text)));
            continue;
        }

        close_list(&mut lines, &mut open_list);
        match block.kind {
            BlockKind::Heading { level } => {
                let depth = heading_depth(level);
                lines.push(format!("<h{depth}>{}</h{depth}>", escape_html(&block.text)));
            }
            BlockKind::Paragraph => {
                lines.push(format!("<p>{}</p>", escape_html(&block.text)));
            }
            BlockKind::Table => {
                lines.push(format!("<pre>{}</pre>", escape_html(&verbatim_body(block))));
            }
            BlockKind::ListItem { .. } => {}
        }
    }
    close_list(&mut lines, &mut open_list);

    let mut rendered = lines.join("\n");
    rendered.push('\n');
    rendered
}

fn close_list(lines: &mut Vec<String>, open_list: &mut Option<bool>) {
    match open_list.take() {
        Some(true) => lines.push("</ol>".to_string()),
        Some(false) => lines.push("</ul>".to_string()),
        None => {}
    }
}

/// Raw source text with per-line indentation and blank lines removed.
fn verbatim_body(block: &TextBlock) -> String {
    let body = block
        .raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join("\n");
    if body.is_empty() {
        block.text.clone()
    } else {
        body
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
