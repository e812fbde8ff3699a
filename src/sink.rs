use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::assemble::Assembly;
use crate::cli::OutputFormat;
use crate::model::AlignmentReport;
use crate::util::{ensure_directory, write_json_pretty, write_text_file};

pub fn page_file_name(page_number: u32, format: OutputFormat) -> String {
    format!("page_{page_number:03}.{}", format.extension())
}

pub fn combined_file_name(format: OutputFormat) -> String {
    format!("combined.{}", format.extension())
}

/// Writes one file per rendered page plus the combined document. The
/// combined file is written even when no page rendered.
pub fn write_assembly(dir: &Path, assembly: &Assembly, format: OutputFormat) -> Result<Vec<PathBuf>> {
    ensure_directory(dir)?;

    let mut written = Vec::with_capacity(assembly.pages.len() + 1);
    for (page_number, content) in &assembly.pages {
        let path = dir.join(page_file_name(*page_number, format));
        write_text_file(&path, content)?;
        written.push(path);
    }

    let combined_path = dir.join(combined_file_name(format));
    write_text_file(&combined_path, &assembly.combined)?;
    written.push(combined_path);

    info!(
        dir = %dir.display(),
        pages = assembly.pages.len(),
        format = format.as_str(),
        "wrote page outputs"
    );
    Ok(written)
}

pub fn write_report(path: &Path, report: &AlignmentReport) -> Result<()> {
    write_json_pretty(path, report)?;
    info!(
        path = %path.display(),
        matched = report.summary.matched,
        attempted = report.summary.attempted,
        "wrote alignment report"
    );
    Ok(())
}
