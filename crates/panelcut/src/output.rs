//! Writing encoded chunks to disk.
//!
//! Every chunk is encoded in memory before the first file is created,
//! so an encoder failure leaves the output directory untouched. If a
//! write fails, the files written so far are removed again.

use std::path::{Path, PathBuf};

use panelcut_export::{ExportError, OutputFormat, OutputPattern, encode_canvas, encode_chunk};
use panelcut_pipeline::{ChapterResult, Chunk, ChunkSink};
use tracing::{info, warn};

/// Errors that stop output.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// A chunk or the merged canvas could not be encoded.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// A file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// An encoded image and the path it belongs at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// Rows covered, for logging.
    pub rows: u32,
}

/// [`ChunkSink`] that encodes each chunk into memory.
struct EncodingSink<'p> {
    pattern: &'p OutputPattern,
    format: OutputFormat,
    files: Vec<EncodedFile>,
}

impl ChunkSink for EncodingSink<'_> {
    type Error = ExportError;

    fn accept(&mut self, chunk: Chunk<'_>) -> Result<(), ExportError> {
        if chunk.forced_unsafe_cut() {
            warn!(
                index = chunk.index(),
                rows = ?chunk.rows(),
                "chunk may be cut through content"
            );
        }
        self.files.push(EncodedFile {
            path: self.pattern.path_for(chunk.index()),
            bytes: encode_chunk(&chunk, self.format)?,
            rows: chunk.height(),
        });
        Ok(())
    }
}

/// Encode every chunk, plus the merged canvas when `merged` is set.
pub fn encode_chapter(
    result: &ChapterResult,
    pattern: &OutputPattern,
    format: OutputFormat,
    merged: bool,
) -> Result<Vec<EncodedFile>, OutputError> {
    let mut sink = EncodingSink {
        pattern,
        format,
        files: Vec::with_capacity(result.plan().chunk_count() + 1),
    };
    panelcut_pipeline::write_chunks(result.chunks(), &mut sink)?;

    let mut files = sink.files;
    if merged {
        files.push(EncodedFile {
            path: pattern.merged_path(),
            bytes: encode_canvas(result.canvas(), format)?,
            rows: result.canvas().height(),
        });
    }
    Ok(files)
}

/// Write every file, removing the ones already written if any write
/// fails.
pub fn write_all(files: &[EncodedFile]) -> Result<(), OutputError> {
    let mut total_rows: u64 = 0;
    for (written, file) in files.iter().enumerate() {
        if let Err(source) = std::fs::write(&file.path, &file.bytes) {
            remove_written(files[..=written].iter().map(|f| f.path.as_path()));
            return Err(OutputError::Write {
                path: file.path.clone(),
                source,
            });
        }
        info!(
            path = %file.path.display(),
            rows = file.rows,
            bytes = file.bytes.len(),
            "saved image"
        );
        total_rows += u64::from(file.rows);
    }
    info!(files = files.len(), total_rows, "output complete");
    Ok(())
}

fn remove_written<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        if path.is_file()
            && let Err(e) = std::fs::remove_file(path)
        {
            warn!(path = %path.display(), "could not remove partial output: {e}");
        }
    }
}
