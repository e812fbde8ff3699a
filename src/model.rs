use serde::{Deserialize, Serialize};

use crate::corpus::CorpusStats;
use crate::matcher::{MatchConfig, MatchSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Heading { level: u8 },
    Paragraph,
    ListItem { ordered: bool, ordinal: usize },
    Table,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heading { .. } => "heading",
            Self::Paragraph => "paragraph",
            Self::ListItem { .. } => "list_item",
            Self::Table => "table",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub kind: BlockKind,
    pub text: String,
    pub raw_text: String,
    pub sequence_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageText {
    pub page_number: u32,
    pub normalized_text: String,
    pub printed_label: Option<String>,
    #[serde(skip)]
    chars: Vec<char>,
}

impl PageText {
    pub fn new(page_number: u32, normalized_text: String, printed_label: Option<String>) -> Self {
        let chars = normalized_text.chars().collect();
        Self {
            page_number,
            normalized_text,
            printed_label,
            chars,
        }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageAssignment {
    Page(u32),
    Unmatched,
}

impl PageAssignment {
    pub fn page_number(self) -> Option<u32> {
        match self {
            Self::Page(number) => Some(number),
            Self::Unmatched => None,
        }
    }

    pub fn is_matched(self) -> bool {
        matches!(self, Self::Page(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Fuzzy,
    BelowThreshold,
    TooShort,
    NoPages,
}

impl MatchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::BelowThreshold => "below_threshold",
            Self::TooShort => "too_short",
            Self::NoPages => "no_pages",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub block_ref: usize,
    pub assigned_page: PageAssignment,
    pub confidence: f64,
    /// Char offset into the assigned page's normalized text; `None` when
    /// localization failed or the block is unmatched.
    pub intra_page_offset: Option<usize>,
    pub method: MatchMethod,
    pub best_candidate: Option<u32>,
}

impl Match {
    pub fn unmatched(block_ref: usize, method: MatchMethod) -> Self {
        Self {
            block_ref,
            assigned_page: PageAssignment::Unmatched,
            confidence: 0.0,
            intra_page_offset: None,
            method,
            best_candidate: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportInputs {
    pub html_path: String,
    pub html_sha256: String,
    pub page_source: String,
    pub page_source_kind: String,
    pub page_source_sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchRow {
    pub sequence_index: usize,
    pub kind: String,
    pub preview: String,
    pub assigned_page: Option<u32>,
    pub confidence: f64,
    pub intra_page_offset: Option<usize>,
    pub method: String,
    pub best_candidate: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlignmentReport {
    pub report_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub command: String,
    pub inputs: ReportInputs,
    pub config: MatchConfig,
    pub corpus: CorpusStats,
    pub summary: MatchSummary,
    pub rendered_pages: Vec<u32>,
    pub output_files: Vec<String>,
    pub warnings: Vec<String>,
    pub matches: Vec<MatchRow>,
}
