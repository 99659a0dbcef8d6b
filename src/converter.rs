//! Directory scanning and parallel dispatch of conversion jobs.

use crate::cli::Cli;
use crate::{epub, pdf};
use anyhow::{Context, Result};
use log::{error, info, warn};
use rayon::prelude::*;
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};

/// What a single conversion job produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// An archive was written.
    Converted { pages: usize, cover: bool },
    /// The input had nothing to pack; no output file was created.
    Skipped,
}

enum Job {
    Archive(PathBuf),
    Document(PathBuf),
}

/// Scan the input directory and convert every matching file.
///
/// Jobs run unordered on a rayon pool and are fully independent; a
/// failing file is logged and never cancels its siblings. Only the
/// rasterizer-missing case aborts the run, and it does so before
/// anything is dispatched. Returns `Ok` even when individual files
/// failed, matching the original tools' exit behavior.
pub fn run(cli: &Cli) -> Result<()> {
    let output_dir = resolve_output_dir(cli);
    fs::create_dir_all(&output_dir).with_context(|| {
        format!("failed to create output directory {}", output_dir.display())
    })?;

    let (epubs, mut pdfs) = scan_inputs(&cli.input_dir)?;
    if epubs.is_empty() && pdfs.is_empty() {
        warn!("no .epub or .pdf files found in {}", cli.input_dir.display());
        println!("Done.");
        return Ok(());
    }

    // Largest documents first so the longest renders start early; the
    // smallest one doubles as the cheap rasterizer probe.
    pdfs.sort_by_key(|(_, size)| Reverse(*size));
    let tool_path = match pdfs.last() {
        Some((smallest, _)) => pdf::resolve_tool(&cli.tool_path, smallest)?,
        None => cli.tool_path.clone(),
    };

    let mut jobs: Vec<Job> = epubs.into_iter().map(Job::Archive).collect();
    jobs.extend(pdfs.into_iter().map(|(path, _)| Job::Document(path)));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cli.jobs.unwrap_or(0))
        .build()
        .context("failed to build worker pool")?;

    let results: Vec<(PathBuf, Result<Outcome>)> = pool.install(|| {
        jobs.par_iter()
            .map(|job| match job {
                Job::Archive(path) => (path.clone(), epub::convert(path, &output_dir)),
                Job::Document(path) => {
                    (path.clone(), pdf::convert(path, &output_dir, &tool_path))
                }
            })
            .collect()
    });

    let mut converted = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for (path, result) in &results {
        match result {
            Ok(Outcome::Converted { .. }) => converted += 1,
            Ok(Outcome::Skipped) => skipped += 1,
            Err(err) => {
                failed += 1;
                error!("{}: failed to convert: {err:#}", display_stem(path));
            }
        }
    }
    info!("{converted} converted, {skipped} skipped, {failed} failed");
    println!("Done.");
    Ok(())
}

fn resolve_output_dir(cli: &Cli) -> PathBuf {
    cli.output_dir
        .clone()
        .unwrap_or_else(|| cli.input_dir.join("out"))
}

/// Enumerate immediate children of the input directory by extension.
/// PDF paths are paired with their file size for the dispatch ordering.
fn scan_inputs(input_dir: &Path) -> Result<(Vec<PathBuf>, Vec<(PathBuf, u64)>)> {
    let mut epubs = Vec::new();
    let mut pdfs = Vec::new();
    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read input directory {}", input_dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        // Follows symlinks so a linked book still converts; dangling
        // links are skipped.
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match extension.as_deref() {
            Some("epub") => epubs.push(path),
            Some("pdf") => pdfs.push((path, metadata.len())),
            _ => {}
        }
    }
    Ok((epubs, pdfs))
}

fn display_stem(path: &Path) -> String {
    path.file_stem()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scan_filters_by_extension_case_insensitively() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.epub"), b"x").unwrap();
        fs::write(dir.path().join("b.EPUB"), b"x").unwrap();
        fs::write(dir.path().join("c.pdf"), b"xx").unwrap();
        fs::write(dir.path().join("d.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub.epub")).unwrap();

        let (epubs, pdfs) = scan_inputs(dir.path()).unwrap();
        assert_eq!(epubs.len(), 2);
        assert_eq!(pdfs.len(), 1);
        assert_eq!(pdfs[0].1, 2);
    }

    #[cfg(unix)]
    #[test]
    fn scan_follows_symlinked_inputs() {
        let dir = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::write(target.path().join("real.epub"), b"x").unwrap();
        std::os::unix::fs::symlink(
            target.path().join("real.epub"),
            dir.path().join("link.epub"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            target.path().join("gone.pdf"),
            dir.path().join("dangling.pdf"),
        )
        .unwrap();

        let (epubs, pdfs) = scan_inputs(dir.path()).unwrap();
        assert_eq!(epubs, [dir.path().join("link.epub")]);
        assert!(pdfs.is_empty());
    }

    #[test]
    fn output_dir_defaults_inside_input_dir() {
        let cli = Cli {
            input_dir: PathBuf::from("/books"),
            output_dir: None,
            tool_path: PathBuf::from("pdftoppm"),
            jobs: None,
        };
        assert_eq!(resolve_output_dir(&cli), PathBuf::from("/books/out"));

        let cli = Cli {
            output_dir: Some(PathBuf::from("/elsewhere")),
            ..cli
        };
        assert_eq!(resolve_output_dir(&cli), PathBuf::from("/elsewhere"));
    }
}
