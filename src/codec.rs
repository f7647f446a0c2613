use crate::foundation::error::DerivaResult;

pub(crate) mod raster;

/// Opaque image-transform capability used by the directive chain executor.
pub trait ImageCodec: Send + Sync {
    /// Decode `bytes` into a mutable handle. Multi-frame assets keep every frame.
    fn open(&self, bytes: &[u8]) -> DerivaResult<Box<dyn ImageHandle>>;
}

/// Decoded image under transformation. Every operation applies to all frames.
pub trait ImageHandle: Send {
    /// Resample to exactly `width`×`height`.
    fn resize(&mut self, height: u32, width: u32) -> DerivaResult<()>;

    /// Keep the `width`×`height` region whose top-left corner is at (`offset_x`, `offset_y`).
    fn crop(&mut self, width: u32, height: u32, offset_x: i64, offset_y: i64)
    -> DerivaResult<()>;

    /// Set the compression quality used by [`ImageHandle::encode`].
    fn set_quality(&mut self, quality: u32) -> DerivaResult<()>;

    /// Encode in the format named by `extension` (falling back to the source format).
    fn encode(&mut self, extension: &str) -> DerivaResult<Vec<u8>>;
}

/// `Content-Type` for a file extension; unknown extensions map to `application/octet-stream`.
pub fn content_type_for(extension: Option<&str>) -> &'static str {
    let Some(ext) = extension else {
        return "application/octet-stream";
    };
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "tga" => "image/x-tga",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
