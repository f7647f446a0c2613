use std::io::Cursor;

use image::{
    AnimationDecoder, Delay, DynamicImage, Frame, GenericImageView, ImageDecoder, ImageFormat,
    ImageReader, Limits,
    codecs::{
        gif::{GifDecoder, GifEncoder, Repeat},
        jpeg::JpegEncoder,
    },
    imageops::FilterType,
};

use crate::{
    codec::{ImageCodec, ImageHandle},
    foundation::error::{DerivaError, DerivaResult},
};

/// JPEG quality used when no `q` directive was applied.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Largest canvas, summed over all frames, a handle may hold: 64 Mpx (256 MiB as RGBA8).
pub const DEFAULT_MAX_PIXELS: u64 = 64 * 1024 * 1024;

const DECODE_ALLOC_FLOOR: u64 = 64 * 1024;

#[derive(Clone, Copy, Debug)]
/// [`ImageCodec`] backed by the `image` crate.
///
/// Every allocation is bounded by a pixel budget: decoding is capped through [`Limits`] and a
/// resize whose output would exceed the budget fails before any buffer is allocated.
pub struct RasterCodec {
    max_pixels: u64,
}

impl Default for RasterCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterCodec {
    /// Codec with [`DEFAULT_MAX_PIXELS`].
    pub fn new() -> Self {
        Self::with_max_pixels(DEFAULT_MAX_PIXELS)
    }

    /// Codec holding at most `max_pixels` pixels across all frames of an image.
    pub fn with_max_pixels(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    /// Pixel budget per image.
    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        // Room for 16-bit RGBA sources, plus decoder bookkeeping on tiny budgets.
        limits.max_alloc = Some(self.max_pixels.saturating_mul(8).max(DECODE_ALLOC_FLOOR));
        limits
    }
}

impl ImageCodec for RasterCodec {
    fn open(&self, bytes: &[u8]) -> DerivaResult<Box<dyn ImageHandle>> {
        let format = image::guess_format(bytes)
            .map_err(|e| DerivaError::codec(format!("unrecognized image data: {e}")))?;

        let frames = if format == ImageFormat::Gif {
            decode_gif_frames(bytes, self.limits())?
        } else {
            let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
            reader.limits(self.limits());
            let image = reader
                .decode()
                .map_err(|e| DerivaError::codec(format!("decode {format:?}: {e}")))?;
            vec![RasterFrame {
                image,
                delay: Delay::from_numer_denom_ms(0, 1),
            }]
        };

        tracing::trace!(?format, frames = frames.len(), "decoded source image");
        Ok(Box::new(RasterImage {
            frames,
            source_format: format,
            quality: None,
            max_pixels: self.max_pixels,
        }))
    }
}

struct RasterFrame {
    image: DynamicImage,
    delay: Delay,
}

struct RasterImage {
    frames: Vec<RasterFrame>,
    source_format: ImageFormat,
    quality: Option<u8>,
    max_pixels: u64,
}

fn decode_gif_frames(bytes: &[u8], limits: Limits) -> DerivaResult<Vec<RasterFrame>> {
    let mut decoder = GifDecoder::new(Cursor::new(bytes))
        .map_err(|e| DerivaError::codec(format!("decode gif: {e}")))?;
    decoder
        .set_limits(limits)
        .map_err(|e| DerivaError::codec(format!("decode gif: {e}")))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| DerivaError::codec(format!("decode gif frames: {e}")))?;
    if frames.is_empty() {
        return Err(DerivaError::codec("gif has no frames"));
    }

    Ok(frames
        .into_iter()
        .map(|f| {
            let delay = f.delay();
            RasterFrame {
                image: DynamicImage::ImageRgba8(f.into_buffer()),
                delay,
            }
        })
        .collect())
}

impl ImageHandle for RasterImage {
    fn resize(&mut self, height: u32, width: u32) -> DerivaResult<()> {
        if height == 0 || width == 0 {
            return Err(DerivaError::codec(format!(
                "resize to {width}x{height} has an empty dimension"
            )));
        }
        let frames = self.frames.len() as u64;
        let pixels = u64::from(width)
            .saturating_mul(u64::from(height))
            .saturating_mul(frames);
        if pixels > self.max_pixels {
            return Err(DerivaError::codec(format!(
                "resize to {width}x{height} over {frames} frame(s) exceeds the {} pixel budget",
                self.max_pixels
            )));
        }
        for frame in &mut self.frames {
            frame.image = frame.image.resize_exact(width, height, FilterType::Lanczos3);
        }
        Ok(())
    }

    fn crop(
        &mut self,
        width: u32,
        height: u32,
        offset_x: i64,
        offset_y: i64,
    ) -> DerivaResult<()> {
        for frame in &mut self.frames {
            let (iw, ih) = frame.image.dimensions();
            let x0 = offset_x.max(0);
            let y0 = offset_y.max(0);
            let x1 = offset_x.saturating_add(i64::from(width)).min(i64::from(iw));
            let y1 = offset_y.saturating_add(i64::from(height)).min(i64::from(ih));
            if x1 <= x0 || y1 <= y0 {
                return Err(DerivaError::codec(format!(
                    "crop {width}x{height}{offset_x:+}{offset_y:+} lies outside a {iw}x{ih} image"
                )));
            }
            // Bounds were clamped to the image above, so the casts are lossless.
            frame.image = frame.image.crop_imm(
                x0 as u32,
                y0 as u32,
                (x1 - x0) as u32,
                (y1 - y0) as u32,
            );
        }
        Ok(())
    }

    fn set_quality(&mut self, quality: u32) -> DerivaResult<()> {
        match u8::try_from(quality) {
            Ok(q @ 1..=100) => {
                self.quality = Some(q);
                Ok(())
            }
            _ => Err(DerivaError::codec(format!(
                "quality {quality} is outside 1..=100"
            ))),
        }
    }

    fn encode(&mut self, extension: &str) -> DerivaResult<Vec<u8>> {
        let format = ImageFormat::from_extension(extension).unwrap_or(self.source_format);
        if !format.writing_enabled() {
            return Err(DerivaError::codec(format!("cannot encode {format:?}")));
        }

        let mut buf = Vec::new();
        match format {
            ImageFormat::Gif if self.frames.len() > 1 => {
                let mut encoder = GifEncoder::new(&mut buf);
                encoder
                    .set_repeat(Repeat::Infinite)
                    .map_err(|e| DerivaError::codec(format!("encode gif: {e}")))?;
                encoder
                    .encode_frames(
                        self.frames
                            .iter()
                            .map(|f| Frame::from_parts(f.image.to_rgba8(), 0, 0, f.delay)),
                    )
                    .map_err(|e| DerivaError::codec(format!("encode gif frames: {e}")))?;
            }
            ImageFormat::Jpeg => {
                let quality = self.quality.unwrap_or(DEFAULT_JPEG_QUALITY);
                let rgb = DynamicImage::ImageRgb8(self.first()?.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
                    .map_err(|e| DerivaError::codec(format!("encode jpeg: {e}")))?;
            }
            _ => {
                self.first()?
                    .write_to(&mut Cursor::new(&mut buf), format)
                    .map_err(|e| DerivaError::codec(format!("encode {format:?}: {e}")))?;
            }
        }
        Ok(buf)
    }
}

impl RasterImage {
    fn first(&self) -> DerivaResult<&DynamicImage> {
        self.frames
            .first()
            .map(|f| &f.image)
            .ok_or_else(|| DerivaError::codec("image has no frames"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/raster.rs"]
mod tests;
