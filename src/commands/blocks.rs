use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::BlocksArgs;
use crate::extract::{ExtractOptions, extract_blocks};
use crate::model::TextBlock;
use crate::util::{read_text_file, write_json_pretty};

pub fn run(args: BlocksArgs) -> Result<()> {
    let html = read_text_file(&args.html)?;
    let options = ExtractOptions {
        strip_reference_markers: args.strip_reference_markers,
        ..ExtractOptions::default()
    };
    let blocks = extract_blocks(&html, &options);

    let counts = count_by_kind(&blocks);
    info!(
        html = %args.html.display(),
        blocks = blocks.len(),
        headings = counts.get("heading").copied().unwrap_or(0),
        paragraphs = counts.get("paragraph").copied().unwrap_or(0),
        list_items = counts.get("list_item").copied().unwrap_or(0),
        tables = counts.get("table").copied().unwrap_or(0),
        "extracted semantic blocks"
    );

    match &args.output {
        Some(path) => {
            write_json_pretty(path, &blocks)?;
            info!(path = %path.display(), "wrote block list");
        }
        None => {
            let rendered =
                serde_json::to_string_pretty(&blocks).context("failed to serialize block list")?;
            println!("{rendered}");
        }
    }

    Ok(())
}

fn count_by_kind(blocks: &[TextBlock]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for block in blocks {
        *counts.entry(block.kind.as_str()).or_insert(0) += 1;
    }
    counts
}
