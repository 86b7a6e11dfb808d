// src/codec.rs

//! PNG encode/decode helpers.
//!
//! Conversions run on Tokio's blocking pool and are serialised by one
//! process-wide lock. The lock guards only the codec call itself, never the
//! surrounding pipeline.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use image::{DynamicImage, ImageFormat};

use crate::errors::{PixelartError, Result};

static CODEC_LOCK: Mutex<()> = Mutex::new(());

fn codec_guard() -> MutexGuard<'static, ()> {
    // The guarded value is `()`, so a poisoned lock carries no broken state.
    CODEC_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _guard = codec_guard();
        f()
    })
    .await
    .map_err(|e| PixelartError::Codec(format!("codec task failed: {e}")))?
}

/// Encode `image` as PNG bytes.
pub async fn encode_png(image: DynamicImage) -> Result<Vec<u8>> {
    blocking(move || {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    })
    .await
}

/// Decode image bytes (format sniffed from the content).
pub async fn decode(bytes: Vec<u8>) -> Result<DynamicImage> {
    blocking(move || Ok(image::load_from_memory(&bytes)?)).await
}

/// Load an image file from disk.
pub async fn load(path: impl Into<PathBuf>) -> Result<DynamicImage> {
    let path = path.into();
    blocking(move || {
        image::open(&path).map_err(|e| {
            PixelartError::Codec(format!("failed to load image {}: {e}", path.display()))
        })
    })
    .await
}

/// Save an image to disk; the format follows the file extension.
pub async fn save(image: DynamicImage, path: impl Into<PathBuf>) -> Result<()> {
    let path = path.into();
    blocking(move || {
        image.save(&path).map_err(|e| {
            PixelartError::Codec(format!("failed to save image {}: {e}", path.display()))
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[tokio::test]
    async fn png_round_trip_preserves_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(12, 7));
        let bytes = encode_png(img).await.unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        let back = decode(bytes).await.unwrap();
        assert_eq!((back.width(), back.height()), (12, 7));
    }

    #[tokio::test]
    async fn garbage_bytes_are_a_codec_error() {
        match decode(b"not an image".to_vec()).await {
            Err(PixelartError::Codec(_)) => {}
            other => panic!("expected Codec error, got {other:?}"),
        }
    }
}
