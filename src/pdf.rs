//! Document conversion pipeline: rasterize PDF pages with an external tool
//! and pack them into a CBZ.

use crate::cbz::CbzWriter;
use crate::converter::Outcome;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Locate the rasterizer before any job is dispatched.
///
/// A path that exists on disk is canonicalized so it stays valid after
/// jobs change their working directory. Anything else is assumed to live
/// on PATH and is probed by rendering the first page of `probe` into a
/// throwaway directory; a tool that cannot even be spawned halts the
/// whole run.
pub fn resolve_tool(tool_path: &Path, probe: &Path) -> Result<PathBuf> {
    if tool_path.exists() {
        return fs::canonicalize(tool_path)
            .with_context(|| format!("failed to resolve {}", tool_path.display()));
    }

    let scratch = tempfile::tempdir().context("failed to create probe directory")?;
    let probe = fs::canonicalize(probe)
        .with_context(|| format!("failed to resolve {}", probe.display()))?;
    let spawned = Command::new(tool_path)
        .args(["-f", "1", "-l", "1", "-jpeg", "-r", "50"])
        .arg(&probe)
        .arg("probe")
        .current_dir(scratch.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match spawned {
        Ok(_) => Ok(tool_path.to_path_buf()),
        Err(err) => bail!(
            "rasterizer {} not found on disk or PATH: {err}",
            tool_path.display()
        ),
    }
}

/// Convert one PDF into `<output_dir>/<stem>.cbz` by rendering every page
/// to JPEG in a private scratch directory and packing the results under
/// 4-digit zero-padded entry names.
pub fn convert(input: &Path, output_dir: &Path, tool_path: &Path) -> Result<Outcome> {
    let prefix = input
        .file_stem()
        .context("input file has no name")?
        .to_string_lossy()
        .to_string();

    // The scratch directory is removed on drop, success or failure.
    let scratch = tempfile::Builder::new()
        .prefix("ebook2cbz-")
        .tempdir()
        .context("failed to create scratch directory")?;

    info!("{prefix}: rendering pdf pages...");
    rasterize(input, tool_path, scratch.path())
        .with_context(|| format!("failed to rasterize {}", input.display()))?;

    info!("{prefix}: building cbz...");
    let output_path = output_dir.join(format!("{prefix}.cbz"));
    let pages = pack_pages(scratch.path(), &output_path)?;
    if pages == 0 {
        warn!("{prefix}: rasterizer produced no pages");
    }
    info!("{prefix}: converted to cbz ({pages} pages)");
    Ok(Outcome::Converted {
        pages,
        cover: false,
    })
}

/// Run the rasterizer synchronously with the scratch directory as its
/// working directory. The exit status is deliberately not inspected: a
/// render that produced nothing shows up as an empty page list downstream.
fn rasterize(input: &Path, tool_path: &Path, scratch: &Path) -> Result<()> {
    let input = fs::canonicalize(input)
        .with_context(|| format!("failed to resolve {}", input.display()))?;
    Command::new(tool_path)
        .args(["-jpeg", "-jpegopt", "quality=97,optimize=y", "-r", "300", "-cropbox"])
        .arg(&input)
        .arg("i")
        .current_dir(scratch)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("failed to run {}", tool_path.display()))?;
    Ok(())
}

/// Pack the rendered `*.jpg` pages into the output archive, in file-name
/// order, as `0000.jpg`, `0001.jpg`, ...
///
/// The rasterizer zero-pads page numbers, so name order is page order.
fn pack_pages(scratch: &Path, output_path: &Path) -> Result<usize> {
    let mut pages = Vec::new();
    for entry in fs::read_dir(scratch)? {
        let path = entry?.path();
        let is_jpg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jpg"));
        if is_jpg {
            pages.push(path);
        }
    }
    pages.sort();

    let mut cbz = CbzWriter::create(output_path)?;
    for (index, page) in pages.iter().enumerate() {
        let mut file = fs::File::open(page)
            .with_context(|| format!("failed to open rendered page {}", page.display()))?;
        cbz.add_entry(&format!("{index:04}.jpg"), &mut file)?;
    }
    cbz.finish()?;
    Ok(pages.len())
}
