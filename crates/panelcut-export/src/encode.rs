//! Raster encoding of chunks and canvases.
//!
//! Pixels are handed to the `image` encoders straight from the borrowed
//! rows. A copy is made only when the target format cannot store the
//! source layout: JPEG drops alpha and lossless WebP needs RGB(A).

use std::borrow::Cow;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use panelcut_pipeline::{Canvas, ChannelLayout, Chunk};
use tracing::debug;

use crate::{ExportError, OutputFormat};

/// Encode one chunk.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode_chunk(chunk: &Chunk<'_>, format: OutputFormat) -> Result<Vec<u8>, ExportError> {
    let bytes = encode_pixels(
        chunk.pixels(),
        chunk.width(),
        chunk.height(),
        chunk.layout(),
        format,
    )?;
    debug!(
        index = chunk.index(),
        rows = ?chunk.rows(),
        bytes = bytes.len(),
        %format,
        "encoded chunk"
    );
    Ok(bytes)
}

/// Encode the whole stitched canvas.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails, for example
/// when the canvas exceeds the format's size limit.
pub fn encode_canvas(canvas: &Canvas, format: OutputFormat) -> Result<Vec<u8>, ExportError> {
    encode_pixels(
        canvas.as_raw(),
        canvas.width(),
        canvas.height(),
        canvas.layout(),
        format,
    )
}

/// Encode a row-major, 8-bit-per-channel pixel buffer.
///
/// # Errors
///
/// Returns [`ExportError::BufferSize`] if `pixels` does not hold
/// exactly `width * height` pixels of `layout`, and
/// [`ExportError::Encode`] if the encoder fails.
pub fn encode_pixels(
    pixels: &[u8],
    width: u32,
    height: u32,
    layout: ChannelLayout,
    format: OutputFormat,
) -> Result<Vec<u8>, ExportError> {
    let expected = u64::from(width) * u64::from(height) * layout.channels() as u64;
    if pixels.len() as u64 != expected {
        return Err(ExportError::BufferSize {
            expected,
            found: pixels.len(),
        });
    }

    let (pixels, layout) = adapt_layout(pixels, layout, format);
    let color = color_type(layout);
    let mut buf = Vec::new();
    match format {
        OutputFormat::Png => PngEncoder::new(&mut buf).write_image(&pixels, width, height, color),
        OutputFormat::Jpeg => JpegEncoder::new_with_quality(&mut buf, OutputFormat::JPEG_QUALITY)
            .write_image(&pixels, width, height, color),
        OutputFormat::WebP => {
            WebPEncoder::new_lossless(&mut buf).write_image(&pixels, width, height, color)
        }
        OutputFormat::Bmp => BmpEncoder::new(&mut buf).write_image(&pixels, width, height, color),
    }
    .map_err(|source| ExportError::Encode { format, source })?;
    Ok(buf)
}

/// Convert `pixels` into a layout `format` can store.
fn adapt_layout(
    pixels: &[u8],
    layout: ChannelLayout,
    format: OutputFormat,
) -> (Cow<'_, [u8]>, ChannelLayout) {
    match (format, layout) {
        (OutputFormat::Jpeg, ChannelLayout::LumaAlpha) => {
            (drop_alpha(pixels, layout), ChannelLayout::Luma)
        }
        (OutputFormat::Jpeg, ChannelLayout::Rgba) => (drop_alpha(pixels, layout), ChannelLayout::Rgb),
        (OutputFormat::WebP, ChannelLayout::Luma) => (
            Cow::Owned(pixels.iter().flat_map(|&l| [l, l, l]).collect()),
            ChannelLayout::Rgb,
        ),
        (OutputFormat::WebP, ChannelLayout::LumaAlpha) => (
            Cow::Owned(
                pixels
                    .chunks_exact(2)
                    .flat_map(|p| [p[0], p[0], p[0], p[1]])
                    .collect(),
            ),
            ChannelLayout::Rgba,
        ),
        _ => (Cow::Borrowed(pixels), layout),
    }
}

fn drop_alpha(pixels: &[u8], layout: ChannelLayout) -> Cow<'_, [u8]> {
    let color = layout.color_channels();
    Cow::Owned(
        pixels
            .chunks_exact(layout.channels())
            .flat_map(|p| &p[..color])
            .copied()
            .collect(),
    )
}

const fn color_type(layout: ChannelLayout) -> ExtendedColorType {
    match layout {
        ChannelLayout::Luma => ExtendedColorType::L8,
        ChannelLayout::LumaAlpha => ExtendedColorType::La8,
        ChannelLayout::Rgb => ExtendedColorType::Rgb8,
        ChannelLayout::Rgba => ExtendedColorType::Rgba8,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{DynamicImage, GenericImageView};
    use panelcut_pipeline::{CutKind, CutPlan, Cut, chunks};

    use super::*;

    fn rgba_canvas(width: u32, height: u32) -> Canvas {
        let data = (0..width * height)
            .flat_map(|i| {
                let v = u8::try_from(i % 251).unwrap();
                [v, 255 - v, v / 2, 200]
            })
            .collect();
        Canvas::from_raw(width, height, ChannelLayout::Rgba, data).unwrap()
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory(bytes).unwrap()
    }

    #[test]
    fn png_round_trips_chunk_pixels() {
        let canvas = rgba_canvas(5, 12);
        let plan = CutPlan::new(
            vec![Cut {
                row: 4,
                kind: CutKind::Safe,
                score: 0.0,
            }],
            12,
        )
        .unwrap();
        let second = chunks(&canvas, &plan).unwrap().nth(1).unwrap();
        let decoded = decode(&encode_chunk(&second, OutputFormat::Png).unwrap());
        assert_eq!(decoded.dimensions(), (5, 8));
        assert_eq!(decoded.into_rgba8().into_raw(), second.pixels());
    }

    #[test]
    fn jpeg_drops_alpha() {
        let canvas = rgba_canvas(8, 8);
        let decoded = decode(&encode_canvas(&canvas, OutputFormat::Jpeg).unwrap());
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!(decoded.dimensions(), (8, 8));
    }

    #[test]
    fn webp_expands_gray() {
        let canvas = Canvas::from_raw(4, 3, ChannelLayout::Luma, vec![77; 12]).unwrap();
        let decoded = decode(&encode_canvas(&canvas, OutputFormat::WebP).unwrap());
        assert_eq!(decoded.into_rgb8().into_raw(), vec![77; 36]);
    }

    #[test]
    fn bmp_keeps_dimensions() {
        let canvas = Canvas::from_raw(3, 7, ChannelLayout::Rgb, vec![10; 63]).unwrap();
        let decoded = decode(&encode_canvas(&canvas, OutputFormat::Bmp).unwrap());
        assert_eq!(decoded.dimensions(), (3, 7));
        assert_eq!(decoded.into_rgb8().into_raw(), vec![10; 63]);
    }

    #[test]
    fn wrong_buffer_length_is_rejected() {
        let result = encode_pixels(&[0; 10], 2, 2, ChannelLayout::Rgb, OutputFormat::Png);
        assert!(matches!(
            result,
            Err(ExportError::BufferSize {
                expected: 12,
                found: 10
            })
        ));
    }

    #[test]
    fn drop_alpha_keeps_color_channels() {
        let out = drop_alpha(&[1, 2, 3, 4, 5, 6, 7, 8], ChannelLayout::Rgba);
        assert_eq!(out.as_ref(), &[1, 2, 3, 5, 6, 7]);
        let out = drop_alpha(&[9, 100, 8, 101], ChannelLayout::LumaAlpha);
        assert_eq!(out.as_ref(), &[9, 8]);
    }
}
