use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::assemble::{AssembleOptions, Assembly, assemble};
use crate::cli::AlignArgs;
use crate::corpus::{self, CorpusOptions, PageCorpus};
use crate::extract::{ExtractOptions, extract_blocks};
use crate::matcher::{MatchConfig, MatchSummary, Matcher};
use crate::model::{AlignmentReport, Match, MatchRow, ReportInputs, TextBlock};
use crate::sink;
use crate::util::{now_utc_string, preview, read_text_file, sha256_file, utc_compact_string};

const REPORT_VERSION: u32 = 1;
const PREVIEW_CHARS: usize = 80;

enum PageSource {
    FormFeedFile(PathBuf),
    Directory(PathBuf),
    Pdf(PathBuf),
}

impl PageSource {
    fn from_args(args: &AlignArgs) -> Result<Self> {
        if let Some(path) = &args.pages_file {
            return Ok(Self::FormFeedFile(path.clone()));
        }
        if let Some(path) = &args.pages_dir {
            return Ok(Self::Directory(path.clone()));
        }
        if let Some(path) = &args.pdf {
            return Ok(Self::Pdf(path.clone()));
        }
        bail!("one of --pages-file, --pages-dir or --pdf is required")
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::FormFeedFile(_) => "form_feed_file",
            Self::Directory(_) => "page_directory",
            Self::Pdf(_) => "pdf",
        }
    }

    fn path(&self) -> &Path {
        match self {
            Self::FormFeedFile(path) | Self::Directory(path) | Self::Pdf(path) => path,
        }
    }

    fn load(&self) -> Result<Vec<String>> {
        match self {
            Self::FormFeedFile(path) => corpus::load_form_feed_file(path),
            Self::Directory(path) => corpus::load_page_directory(path),
            Self::Pdf(path) => corpus::extract_pdf_pages(path),
        }
    }

    /// Directories have no single content hash.
    fn fingerprint(&self) -> Result<Option<String>> {
        match self {
            Self::Directory(_) => Ok(None),
            Self::FormFeedFile(path) | Self::Pdf(path) => sha256_file(path).map(Some),
        }
    }
}

/// State for aligning one document. Built per run and dropped with it, so
/// nothing carries over between documents.
struct AlignmentRun {
    blocks: Vec<TextBlock>,
    corpus: PageCorpus,
    matches: Vec<Match>,
    summary: MatchSummary,
    warnings: Vec<String>,
}

impl AlignmentRun {
    fn execute(blocks: Vec<TextBlock>, corpus: PageCorpus, matcher: &Matcher) -> Self {
        let mut warnings = Vec::new();
        if blocks.is_empty() {
            warn!("no semantic blocks extracted from html");
            warnings.push("no semantic blocks extracted from html".to_string());
        }
        if corpus.is_empty() {
            warn!("page corpus is empty; every block will be unmatched");
            warnings.push("page corpus is empty".to_string());
        }

        let matches = matcher.match_blocks(&blocks, &corpus);
        let summary = MatchSummary::from_matches(&matches);

        info!(
            attempted = summary.attempted,
            matched = summary.matched,
            exact = summary.exact,
            fuzzy = summary.fuzzy,
            unmatched = summary.unmatched,
            coverage = summary.coverage(),
            "matched {}/{} blocks",
            summary.matched,
            summary.attempted
        );

        Self {
            blocks,
            corpus,
            matches,
            summary,
            warnings,
        }
    }

    fn assemble(&self, options: &AssembleOptions) -> Assembly {
        assemble(&self.blocks, &self.matches, options)
    }

    fn match_rows(&self) -> Vec<MatchRow> {
        self.blocks
            .iter()
            .zip(&self.matches)
            .map(|(block, found)| MatchRow {
                sequence_index: block.sequence_index,
                kind: block.kind.as_str().to_string(),
                preview: preview(&block.text, PREVIEW_CHARS),
                assigned_page: found.assigned_page.page_number(),
                confidence: found.confidence,
                intra_page_offset: found.intra_page_offset,
                method: found.method.as_str().to_string(),
                best_candidate: found.best_candidate,
            })
            .collect()
    }
}

pub fn run(args: AlignArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    info!(html = %args.html.display(), run_id = %run_id, "starting alignment");

    let config = resolve_match_config(&args)?;
    let matcher = Matcher::new(config);
    let page_source = PageSource::from_args(&args)?;

    let html = read_text_file(&args.html)?;
    let extract_options = ExtractOptions {
        strip_reference_markers: args.strip_reference_markers,
        ..ExtractOptions::default()
    };
    let blocks = extract_blocks(&html, &extract_options);
    info!(blocks = blocks.len(), "extracted semantic blocks");

    let raw_pages = page_source.load()?;
    let corpus_options = CorpusOptions {
        strip_running_lines: args.strip_running_lines,
        merge_hyphenation: args.dehyphenate,
        strip_page_labels: args.strip_page_labels,
    };
    let corpus = PageCorpus::new(&raw_pages, &corpus_options);
    info!(
        pages = corpus.len(),
        empty_pages = corpus.stats().empty_page_count,
        source = page_source.kind(),
        "built page corpus"
    );

    let alignment = AlignmentRun::execute(blocks, corpus, &matcher);

    let assemble_options = AssembleOptions {
        format: args.format,
        include_page_title: !args.no_page_titles,
    };
    let assembly = alignment.assemble(&assemble_options);
    let written = sink::write_assembly(&args.output_dir, &assembly, args.format)?;

    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| args.output_dir.join("alignment_report.json"));

    let report = AlignmentReport {
        report_version: REPORT_VERSION,
        run_id,
        started_at,
        finished_at: now_utc_string(),
        command: render_align_command(&args),
        inputs: ReportInputs {
            html_path: args.html.display().to_string(),
            html_sha256: sha256_file(&args.html)?,
            page_source: page_source.path().display().to_string(),
            page_source_kind: page_source.kind().to_string(),
            page_source_sha256: page_source.fingerprint()?,
        },
        config: matcher.config().clone(),
        corpus: alignment.corpus.stats().clone(),
        summary: alignment.summary.clone(),
        rendered_pages: assembly.pages.keys().copied().collect(),
        output_files: written
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
        warnings: alignment.warnings.clone(),
        matches: alignment.match_rows(),
    };
    sink::write_report(&report_path, &report)?;

    if args.require_matches && alignment.summary.matched == 0 {
        bail!(
            "no blocks were assigned to a page ({} attempted); see {}",
            alignment.summary.attempted,
            report_path.display()
        );
    }

    info!(
        output_dir = %args.output_dir.display(),
        pages = assembly.pages.len(),
        report = %report_path.display(),
        "alignment completed"
    );

    Ok(())
}

/// File settings first, then explicit flags, then clamping.
fn resolve_match_config(args: &AlignArgs) -> Result<MatchConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = read_text_file(path)?;
            serde_json::from_str::<MatchConfig>(&raw)
                .with_context(|| format!("failed to parse matcher config: {}", path.display()))?
        }
        None => MatchConfig::default(),
    };

    if let Some(value) = args.page_threshold {
        config.page_threshold = value;
    }
    if let Some(value) = args.localization_threshold {
        config.localization_threshold = value;
    }
    if let Some(value) = args.min_block_length {
        config.min_block_length = value;
    }
    if let Some(value) = args.window_step {
        config.window_step = value;
    }
    if args.no_substring_short_circuit {
        config.substring_short_circuit = false;
    }
    if args.sequential {
        config.parallel = false;
    }

    Ok(config.validated())
}

fn render_align_command(args: &AlignArgs) -> String {
    let mut command = vec![
        "pagealign".to_string(),
        "align".to_string(),
        "--html".to_string(),
        args.html.display().to_string(),
    ];

    if let Some(path) = &args.pages_file {
        command.push("--pages-file".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.pages_dir {
        command.push("--pages-dir".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.pdf {
        command.push("--pdf".to_string());
        command.push(path.display().to_string());
    }
    command.push("--output-dir".to_string());
    command.push(args.output_dir.display().to_string());
    if let Some(path) = &args.report_path {
        command.push("--report-path".to_string());
        command.push(path.display().to_string());
    }
    command.push("--format".to_string());
    command.push(args.format.as_str().to_string());
    if let Some(path) = &args.config {
        command.push("--config".to_string());
        command.push(path.display().to_string());
    }
    if let Some(value) = args.page_threshold {
        command.push("--page-threshold".to_string());
        command.push(value.to_string());
    }
    if let Some(value) = args.localization_threshold {
        command.push("--localization-threshold".to_string());
        command.push(value.to_string());
    }
    if let Some(value) = args.min_block_length {
        command.push("--min-block-length".to_string());
        command.push(value.to_string());
    }
    if let Some(value) = args.window_step {
        command.push("--window-step".to_string());
        command.push(value.to_string());
    }

    let switches = [
        (args.no_substring_short_circuit, "--no-substring-short-circuit"),
        (args.sequential, "--sequential"),
        (args.strip_running_lines, "--strip-running-lines"),
        (args.dehyphenate, "--dehyphenate"),
        (args.strip_page_labels, "--strip-page-labels"),
        (args.strip_reference_markers, "--strip-reference-markers"),
        (args.no_page_titles, "--no-page-titles"),
        (args.require_matches, "--require-matches"),
    ];
    for (enabled, flag) in switches {
        if enabled {
            command.push(flag.to_string());
        }
    }

    command.join(" ")
}
