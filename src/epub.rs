//! Archive conversion pipeline: re-pack an EPUB's page images into a CBZ.

use crate::cbz::CbzWriter;
use crate::converter::Outcome;
use crate::opf;
use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Convert one EPUB container into `<output_dir>/<stem>.cbz`.
///
/// The cover (when one can be resolved) is written first as
/// `c_<file name>`, followed by the page images sorted case-insensitively
/// by full path, each as `i_<file name>`. A container without any
/// image-like entries produces no output file at all.
pub fn convert(input: &Path, output_dir: &Path) -> Result<Outcome> {
    let prefix = input
        .file_stem()
        .context("input file has no name")?
        .to_string_lossy()
        .to_string();
    info!("{prefix}: converting...");

    let file =
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("failed to read container {}", input.display()))?;

    let mut names = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        names.push(entry.name().to_string());
    }

    let mut images: Vec<String> = names.iter().filter(|n| is_image_name(n)).cloned().collect();
    if images.is_empty() {
        warn!("{prefix}: no images found, skipping");
        return Ok(Outcome::Skipped);
    }

    let stats = folder_stats(&images);
    let (folder, count) = top_folder(&stats).context("image folder stats are empty")?;
    let percent = (count * 100) as f64 / images.len() as f64;
    info!("{prefix}: top image folder is {folder} with {percent:.0}% of files");

    // The winning folder is informational only: images outside it are
    // still packed as pages.
    let cover = resolve_cover(&mut archive, &names, &prefix);
    match &cover {
        Some(path) => images.retain(|p| p != path),
        None => warn!("{prefix}: no cover found"),
    }
    images.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()));

    let output_path = output_dir.join(format!("{prefix}.cbz"));
    let mut cbz = CbzWriter::create(&output_path)?;
    if let Some(path) = &cover {
        let mut entry = archive.by_name(path)?;
        cbz.add_entry(&format!("c_{}", file_name(path)), &mut entry)?;
    }
    for path in &images {
        let mut entry = archive.by_name(path)?;
        cbz.add_entry(&format!("i_{}", file_name(path)), &mut entry)?;
    }
    cbz.finish()?;

    info!("{prefix}: converted to cbz ({} pages)", images.len());
    Ok(Outcome::Converted {
        pages: images.len(),
        cover: cover.is_some(),
    })
}

/// Find the full entry path of the cover image, if any.
///
/// Tries the OPF package document first, then falls back to scanning for
/// an image whose file name contains "cover". The resolved target is
/// matched back against entry file names case-insensitively; an href that
/// carries a directory is matched on its file-name component.
fn resolve_cover<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    names: &[String],
    prefix: &str,
) -> Option<String> {
    let mut target: Option<String> = None;

    let opf_path = names
        .iter()
        .find(|n| file_name(n).to_lowercase().ends_with(".opf"))
        .cloned();
    if let Some(opf_path) = opf_path {
        match read_entry_string(archive, &opf_path) {
            Ok(xml) => match opf::cover_href(&xml) {
                Ok(href) => target = href,
                Err(err) => warn!("{prefix}: failed to parse {opf_path}: {err:#}"),
            },
            Err(err) => warn!("{prefix}: failed to read {opf_path}: {err:#}"),
        }
    }

    if target.is_none() {
        target = names
            .iter()
            .find(|n| file_name(n).to_lowercase().contains("cover") && is_image_name(n))
            .map(|n| file_name(n).to_string());
    }

    let want = file_name(&target?).to_lowercase();
    names
        .iter()
        .find(|n| file_name(n).to_lowercase() == want)
        .cloned()
}

fn read_entry_string<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut entry = archive.by_name(name)?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

fn is_image_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".jpg") || lower.ends_with(".jpeg") || lower.ends_with(".png")
}

// Entry paths inside a container always use forward slashes, so folder and
// file name handling is plain string work rather than `Path` manipulation.

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn folder_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Count image entries per folder. Counts always sum to `images.len()`;
/// top-level files count under the empty-string folder.
fn folder_stats(images: &[String]) -> HashMap<String, usize> {
    let mut stats = HashMap::new();
    for path in images {
        *stats.entry(folder_of(path).to_string()).or_insert(0) += 1;
    }
    stats
}

/// The folder holding the most images. Equal counts break to the
/// lexicographically smallest folder path so the choice is deterministic.
fn top_folder(stats: &HashMap<String, usize>) -> Option<(&str, usize)> {
    stats
        .iter()
        .map(|(folder, count)| (folder.as_str(), *count))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
}
