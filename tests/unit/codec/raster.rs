use std::io::Cursor;

use image::{Delay, Frame, GenericImageView, ImageFormat, Rgba, RgbaImage};

use super::*;

fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8, 255])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn encode_two_frame_gif(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        let frames = [Rgba([255, 0, 0, 255]), Rgba([0, 0, 255, 255])].map(|px| {
            Frame::from_parts(
                RgbaImage::from_pixel(width, height, px),
                0,
                0,
                Delay::from_numer_denom_ms(100, 1),
            )
        });
        encoder.encode_frames(frames).unwrap();
    }
    buf
}

fn decode(bytes: &[u8]) -> DynamicImage {
    image::load_from_memory(bytes).unwrap()
}

#[test]
fn resize_takes_height_then_width() {
    let mut handle = RasterCodec::new().open(&encode_png(40, 30)).unwrap();
    handle.resize(10, 20).unwrap();
    let out = decode(&handle.encode("png").unwrap());
    assert_eq!(out.dimensions(), (20, 10));
}

#[test]
fn resize_rejects_empty_dimensions() {
    let mut handle = RasterCodec::new().open(&encode_png(4, 4)).unwrap();
    assert!(matches!(handle.resize(0, 5), Err(DerivaError::Codec(_))));
}

#[test]
fn crop_positive_offsets() {
    let mut handle = RasterCodec::new().open(&encode_png(40, 30)).unwrap();
    handle.crop(10, 5, 3, 4).unwrap();
    let out = decode(&handle.encode("png").unwrap());
    assert_eq!(out.dimensions(), (10, 5));
    let src = decode(&encode_png(40, 30));
    assert_eq!(out.get_pixel(0, 0), src.get_pixel(3, 4));
}

#[test]
fn crop_clips_to_canvas() {
    let mut handle = RasterCodec::new().open(&encode_png(40, 30)).unwrap();
    handle.crop(20, 20, -5, 25).unwrap();
    let out = decode(&handle.encode("png").unwrap());
    assert_eq!(out.dimensions(), (15, 5));
}

#[test]
fn crop_outside_canvas_is_codec_error() {
    let mut handle = RasterCodec::new().open(&encode_png(10, 10)).unwrap();
    assert!(matches!(
        handle.crop(5, 5, 20, 0),
        Err(DerivaError::Codec(_))
    ));
}

#[test]
fn quality_range_is_enforced_by_codec() {
    let mut handle = RasterCodec::new().open(&encode_png(8, 8)).unwrap();
    assert!(handle.set_quality(50).is_ok());
    assert!(matches!(handle.set_quality(0), Err(DerivaError::Codec(_))));
    assert!(matches!(
        handle.set_quality(101),
        Err(DerivaError::Codec(_))
    ));
}

#[test]
fn lower_quality_yields_smaller_jpeg() {
    let png = encode_png(64, 64);

    let mut hi = RasterCodec::new().open(&png).unwrap();
    hi.set_quality(95).unwrap();
    let hi = hi.encode("jpg").unwrap();

    let mut lo = RasterCodec::new().open(&png).unwrap();
    lo.set_quality(20).unwrap();
    let lo = lo.encode("jpg").unwrap();

    assert_eq!(image::guess_format(&lo).unwrap(), ImageFormat::Jpeg);
    assert!(lo.len() < hi.len());
}

#[test]
fn encode_follows_extension_then_source_format() {
    let png = encode_png(6, 6);

    let mut handle = RasterCodec::new().open(&png).unwrap();
    let jpeg = handle.encode("jpeg").unwrap();
    assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);

    let mut handle = RasterCodec::new().open(&png).unwrap();
    let same = handle.encode("thumb").unwrap();
    assert_eq!(image::guess_format(&same).unwrap(), ImageFormat::Png);
}

#[test]
fn garbage_bytes_are_codec_errors() {
    let err = match RasterCodec::new().open(b"definitely not an image") {
        Err(err) => err,
        Ok(_) => panic!("garbage decoded"),
    };
    assert!(matches!(err, DerivaError::Codec(_)));
}

#[test]
fn gif_operations_apply_to_every_frame() {
    let gif = encode_two_frame_gif(16, 12);
    let mut handle = RasterCodec::new().open(&gif).unwrap();
    handle.resize(6, 8).unwrap();
    let out = handle.encode("gif").unwrap();

    let decoder = GifDecoder::new(Cursor::new(out.as_slice())).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 2);
    for frame in &frames {
        assert_eq!(frame.buffer().dimensions(), (8, 6));
    }
}

#[test]
fn content_types_by_extension() {
    use crate::codec::content_type_for;

    assert_eq!(content_type_for(Some("jpg")), "image/jpeg");
    assert_eq!(content_type_for(Some("JPEG")), "image/jpeg");
    assert_eq!(content_type_for(Some("png")), "image/png");
    assert_eq!(content_type_for(Some("gif")), "image/gif");
    assert_eq!(content_type_for(Some("bin")), "application/octet-stream");
    assert_eq!(content_type_for(None), "application/octet-stream");
}

#[test]
fn oversized_resize_fails_before_allocating() {
    let mut handle = RasterCodec::new().open(&encode_png(8, 8)).unwrap();
    assert!(matches!(
        handle.resize(u32::MAX, u32::MAX),
        Err(DerivaError::Codec(_))
    ));
    assert!(matches!(
        handle.resize(60_000, 60_000),
        Err(DerivaError::Codec(_))
    ));
    handle.resize(4, 4).unwrap();
}

#[test]
fn pixel_budget_counts_every_frame() {
    let codec = RasterCodec::with_max_pixels(100);
    let mut still = codec.open(&encode_png(4, 4)).unwrap();
    still.resize(10, 10).unwrap();
    assert!(matches!(still.resize(10, 11), Err(DerivaError::Codec(_))));

    let mut animated = codec.open(&encode_two_frame_gif(4, 4)).unwrap();
    animated.resize(5, 10).unwrap();
    assert!(matches!(animated.resize(10, 10), Err(DerivaError::Codec(_))));
}

#[test]
fn decoding_respects_the_budget() {
    let codec = RasterCodec::with_max_pixels(16);
    assert!(matches!(
        codec.open(&encode_png(200, 200)),
        Err(DerivaError::Codec(_))
    ));
    assert!(codec.open(&encode_png(2, 2)).is_ok());
    assert!(RasterCodec::new().open(&encode_png(200, 200)).is_ok());
}
