use clap::Parser;
use std::path::PathBuf;

/// Convert EPUB and PDF ebooks to CBZ image archives
#[derive(Parser, Debug)]
#[command(name = "ebook2cbz", version, about)]
pub struct Cli {
    /// Directory to scan for .epub and .pdf files (immediate children only)
    pub input_dir: PathBuf,

    /// Destination directory for the produced .cbz archives.
    /// Defaults to an `out` directory inside the input directory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Rasterizer executable used to render PDF pages
    #[arg(long, default_value = "pdftoppm")]
    pub tool_path: PathBuf,

    /// Cap the number of files converted concurrently.
    /// Defaults to one worker per CPU core.
    #[arg(short, long)]
    pub jobs: Option<usize>,
}
