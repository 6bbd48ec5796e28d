//! JPEG transcoding for the image family.
//!
//! Plain raster images are decoded and re-encoded as JPEG, and any failure
//! there is reported to the caller. HEIC/HEIF input goes through a pluggable
//! [`HeicDecoder`] and falls back to the untouched original on any failure.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use keepsake_core::constants::DEFAULT_JPEG_QUALITY;
use keepsake_core::{AppError, MediaItem, MediaKind, SelectedFile};
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to load image: {file_name}: {message}")]
    Decode { file_name: String, message: String },

    #[error("Failed to convert image to JPEG: {file_name}: {message}")]
    Encode { file_name: String, message: String },

    #[error("Transcode task failed: {0}")]
    Task(String),
}

impl From<TranscodeError> for AppError {
    fn from(err: TranscodeError) -> Self {
        AppError::Transcode(err.to_string())
    }
}

/// Decodes HEIC/HEIF containers into raster images.
pub trait HeicDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, String>;
}

/// Default HEIC decoder: hands the bytes to the raster pipeline with format
/// sniffing. This recovers files that carry a HEIC name but are really JPEG or
/// PNG; true HEIC payloads fail and take the soft-fail path.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterFallbackDecoder;

impl HeicDecoder for RasterFallbackDecoder {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, String> {
        decode_raster(data)
    }
}

fn decode_raster(data: &[u8]) -> Result<DynamicImage, String> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .decode()
        .map_err(|e| e.to_string())
}

/// `0.8` -> `80`, clamped to the encoder's 1..=100 range.
fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Replace the last extension with `.jpg` (`IMG_1.HEIC` -> `IMG_1.jpg`).
pub fn jpeg_file_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && !ext.contains(['/', '\\']) => {
            format!("{}.jpg", stem)
        }
        _ => format!("{}.jpg", name),
    }
}

#[derive(Clone)]
pub struct ImageTranscoder {
    quality: f32,
    heic_decoder: Arc<dyn HeicDecoder>,
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageTranscoder {
    /// `quality` is a fraction in (0, 1].
    pub fn new(quality: f32) -> Self {
        Self {
            quality,
            heic_decoder: Arc::new(RasterFallbackDecoder),
        }
    }

    pub fn with_heic_decoder(mut self, decoder: Arc<dyn HeicDecoder>) -> Self {
        self.heic_decoder = decoder;
        self
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Transcode one item. GIFs and videos are returned unchanged.
    pub fn transcode(&self, item: MediaItem) -> Result<MediaItem, TranscodeError> {
        match item.kind {
            MediaKind::Gif | MediaKind::Video => Ok(item),
            MediaKind::HeicImage => Ok(self.transcode_heic(item)),
            MediaKind::Image => self.transcode_raster(item),
        }
    }

    /// [`transcode`](Self::transcode) on the blocking pool.
    pub async fn transcode_blocking(&self, item: MediaItem) -> Result<MediaItem, TranscodeError> {
        let transcoder = self.clone();
        tokio::task::spawn_blocking(move || transcoder.transcode(item))
            .await
            .map_err(|e| TranscodeError::Task(e.to_string()))?
    }

    fn transcode_heic(&self, item: MediaItem) -> MediaItem {
        let name = item.name().to_string();
        let converted = self
            .heic_decoder
            .decode(&item.file.data)
            .map_err(|message| TranscodeError::Decode {
                file_name: name.clone(),
                message,
            })
            .and_then(|img| self.encode(&name, &img));

        match converted {
            Ok(jpeg) => {
                tracing::debug!(
                    file_name = %name,
                    original_bytes = item.size_bytes(),
                    jpeg_bytes = jpeg.len(),
                    "Converted HEIC image"
                );
                into_jpeg(item, jpeg)
            }
            Err(e) => {
                tracing::warn!(
                    file_name = %name,
                    error = %e,
                    "HEIC conversion failed, uploading original file"
                );
                item
            }
        }
    }

    fn transcode_raster(&self, item: MediaItem) -> Result<MediaItem, TranscodeError> {
        let name = item.name().to_string();
        let img = decode_raster(&item.file.data).map_err(|message| TranscodeError::Decode {
            file_name: name.clone(),
            message,
        })?;
        let jpeg = self.encode(&name, &img)?;

        tracing::debug!(
            file_name = %name,
            original_bytes = item.size_bytes(),
            jpeg_bytes = jpeg.len(),
            "Re-encoded image as JPEG"
        );
        Ok(into_jpeg(item, jpeg))
    }

    fn encode(&self, file_name: &str, img: &DynamicImage) -> Result<Vec<u8>, TranscodeError> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(self.quality));
        // JPEG has no alpha channel.
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(|e| TranscodeError::Encode {
                file_name: file_name.to_string(),
                message: e.to_string(),
            })?;
        Ok(buffer)
    }
}

fn into_jpeg(item: MediaItem, jpeg: Vec<u8>) -> MediaItem {
    let file = SelectedFile::new(
        jpeg_file_name(item.name()),
        JPEG_CONTENT_TYPE,
        Bytes::from(jpeg),
    );
    MediaItem::new(file, item.kind)
}
