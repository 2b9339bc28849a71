//! Inline image transcoding.
//!
//! Inbound images are downloaded and re-encoded as bounded JPEG so the
//! backend can store them without a second round trip. Decoding and encoding
//! run on the blocking pool; a failure keeps the reference-only media info.

use super::{Classified, MediaDownloader, MessageType};
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use serde_json::Value;
use tracing::{debug, warn};
use zapgate_core::{Error, Result};

/// MIME type of the transcoded output
pub const OUTPUT_MIMETYPE: &str = "image/jpeg";

/// Transcoding bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    /// Longest allowed width
    pub max_width: u32,
    /// Longest allowed height
    pub max_height: u32,
    /// JPEG quality 1-100
    pub quality: u8,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            quality: 85,
        }
    }
}

/// Re-encoded image
#[derive(Debug, Clone)]
pub struct TranscodedImage {
    /// JPEG bytes
    pub data: Vec<u8>,
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
}

impl TranscodedImage {
    /// Base64 (standard alphabet) of the JPEG bytes
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// Decode, downscale to fit the bounds (aspect ratio kept) and encode as JPEG.
pub fn transcode_image(bytes: &[u8], options: TranscodeOptions) -> Result<TranscodedImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::Transcode(format!("decode: {e}")))?;

    let resized = if decoded.width() > options.max_width || decoded.height() > options.max_height
    {
        decoded.resize(options.max_width, options.max_height, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let (width, height) = (rgb.width(), rgb.height());

    let mut data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut data, options.quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| Error::Transcode(format!("encode: {e}")))?;

    Ok(TranscodedImage {
        data,
        width,
        height,
    })
}

/// Download the image behind `raw` and attach the compressed copy to
/// `classified.media_info`. Never fails: errors are logged and the
/// reference fields stay as they were.
pub async fn enrich_image<D>(
    classified: &mut Classified,
    raw: &Value,
    downloader: &D,
    options: TranscodeOptions,
) where
    D: MediaDownloader + ?Sized,
{
    if classified.message_type != MessageType::Image {
        return;
    }

    match download_and_transcode(raw, downloader, options).await {
        Ok(image) => {
            debug!(
                width = image.width,
                height = image.height,
                bytes = image.data.len(),
                "Image transcoded"
            );
            let info = &mut classified.media_info;
            info.image_compressed = Some(image.to_base64());
            info.image_width = Some(image.width);
            info.image_height = Some(image.height);
            info.image_mimetype = Some(OUTPUT_MIMETYPE.to_string());
        }
        Err(e) => {
            warn!(error = %e, "Image transcoding failed, keeping reference only");
        }
    }
}

async fn download_and_transcode<D>(
    raw: &Value,
    downloader: &D,
    options: TranscodeOptions,
) -> Result<TranscodedImage>
where
    D: MediaDownloader + ?Sized,
{
    let bytes = downloader
        .download_media(raw)
        .await
        .map_err(|e| Error::Transcode(format!("download: {e}")))?;

    tokio::task::spawn_blocking(move || transcode_image(&bytes, options))
        .await
        .map_err(|e| Error::Transcode(format!("worker: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Bmp)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_downscales_preserving_aspect_ratio() {
        let input = bmp_bytes(2400, 1200);
        let out = transcode_image(&input, TranscodeOptions::default()).unwrap();

        assert_eq!(out.width, 1920);
        assert_eq!(out.height, 960);
        assert!(out.data.len() < input.len());
        assert_eq!(&out.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_small_image_keeps_dimensions() {
        let input = bmp_bytes(64, 48);
        let out = transcode_image(&input, TranscodeOptions::default()).unwrap();
        assert_eq!((out.width, out.height), (64, 48));
    }

    #[test]
    fn test_garbage_is_transcode_error() {
        let err = transcode_image(b"not an image", TranscodeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Transcode(_)));
    }
}
