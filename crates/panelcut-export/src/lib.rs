//! panelcut-export: Chunk encoders and output naming (sans-IO)
//!
//! Turns pipeline chunks into encoded image bytes and maps chunk
//! indices to file names. Writing the bytes is left to the caller.

pub mod encode;
pub mod format;
pub mod pattern;

pub use encode::{encode_canvas, encode_chunk, encode_pixels};
pub use format::OutputFormat;
pub use pattern::{MERGED_NAME, OutputPattern};

/// Errors produced while encoding or naming output.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The encoder rejected the image.
    #[error("failed to encode {format}: {source}")]
    Encode {
        /// Target format.
        format: OutputFormat,
        /// Underlying encoder error.
        #[source]
        source: image::ImageError,
    },

    /// A raw pixel buffer does not match its declared shape.
    #[error("pixel buffer holds {found} bytes, expected {expected}")]
    BufferSize {
        /// Bytes implied by width, height and layout.
        expected: u64,
        /// Actual buffer length.
        found: usize,
    },

    /// A file extension does not name a supported format.
    #[error("unsupported output extension {extension:?} (expected png, jpg, jpeg, webp or bmp)")]
    UnknownFormat {
        /// The extension found, empty if there was none.
        extension: String,
    },

    /// An output pattern is malformed.
    #[error("invalid output pattern {pattern:?}: {reason}")]
    Pattern {
        /// The pattern as given.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },
}
