use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Writer for the output CBZ container.
///
/// Entries are deflate-compressed at the maximum level and their contents
/// are streamed byte-for-byte from the source; image data is never
/// re-encoded.
pub struct CbzWriter {
    zip: ZipWriter<BufWriter<File>>,
    options: SimpleFileOptions,
}

impl CbzWriter {
    /// Create the archive at `path`, overwriting any existing file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self {
            zip: ZipWriter::new(BufWriter::new(file)),
            options: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9))
                // Fixed timestamp keeps re-runs over the same input
                // byte-identical.
                .last_modified_time(zip::DateTime::default()),
        })
    }

    /// Append one entry, streaming `reader` into the archive.
    pub fn add_entry(&mut self, name: &str, reader: &mut impl Read) -> Result<u64> {
        self.zip
            .start_file(name, self.options)
            .with_context(|| format!("failed to start entry {name}"))?;
        let written = io::copy(reader, &mut self.zip)
            .with_context(|| format!("failed to write entry {name}"))?;
        Ok(written)
    }

    /// Finalize the archive. The file is complete only after this returns.
    pub fn finish(self) -> Result<()> {
        self.zip.finish().context("failed to finalize archive")?;
        Ok(())
    }
}
