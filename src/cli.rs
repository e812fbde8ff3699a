use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "pagealign",
    version,
    about = "Align semantic HTML blocks with paginated page text and rebuild per-page documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Align(AlignArgs),
    Blocks(BlocksArgs),
}

#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("page_source")
        .required(true)
        .args(["pages_file", "pages_dir", "pdf"])
))]
pub struct AlignArgs {
    #[arg(long)]
    pub html: PathBuf,

    #[arg(long)]
    pub pages_file: Option<PathBuf>,

    #[arg(long)]
    pub pages_dir: Option<PathBuf>,

    #[arg(long)]
    pub pdf: Option<PathBuf>,

    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// JSON file with matcher settings; explicit flags below take precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub page_threshold: Option<f64>,

    #[arg(long)]
    pub localization_threshold: Option<f64>,

    #[arg(long)]
    pub min_block_length: Option<usize>,

    #[arg(long)]
    pub window_step: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub no_substring_short_circuit: bool,

    #[arg(long, default_value_t = false)]
    pub sequential: bool,

    #[arg(long, default_value_t = false)]
    pub strip_running_lines: bool,

    #[arg(long, default_value_t = false)]
    pub dehyphenate: bool,

    #[arg(long, default_value_t = false)]
    pub strip_page_labels: bool,

    #[arg(long, default_value_t = false)]
    pub strip_reference_markers: bool,

    #[arg(long, default_value_t = false)]
    pub no_page_titles: bool,

    #[arg(long, default_value_t = false)]
    pub require_matches: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BlocksArgs {
    #[arg(long)]
    pub html: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub strip_reference_markers: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
        }
    }

    pub fn page_separator(self) -> &'static str {
        match self {
            Self::Markdown => "\n\n---\n\n",
            Self::Html => "\n<hr>\n",
        }
    }
}
