// src/engine/result.rs

use std::time::Duration;

use image::DynamicImage;

/// A successfully converted image.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub image: DynamicImage,
    /// Wall-clock time from request start to decoded output.
    pub processing_time: Duration,
}

/// Outcome of one request. Exactly one of image or message is present.
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    Success(ProcessedImage),
    Failure(String),
}

impl ProcessingResult {
    pub fn success(image: DynamicImage, processing_time: Duration) -> Self {
        Self::Success(ProcessedImage {
            image,
            processing_time,
        })
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        match self {
            Self::Success(p) => Some(&p.image),
            Self::Failure(_) => None,
        }
    }

    pub fn processing_time(&self) -> Option<Duration> {
        match self {
            Self::Success(p) => Some(p.processing_time),
            Self::Failure(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(msg) => Some(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn accessors_match_variant() {
        let ok = ProcessingResult::success(
            DynamicImage::ImageRgb8(RgbImage::new(2, 2)),
            Duration::from_millis(5),
        );
        assert!(ok.is_success());
        assert!(ok.image().is_some());
        assert_eq!(ok.processing_time(), Some(Duration::from_millis(5)));
        assert_eq!(ok.error_message(), None);

        let err = ProcessingResult::failure("bad palette");
        assert!(!err.is_success());
        assert!(err.image().is_none());
        assert_eq!(err.error_message(), Some("bad palette"));
    }
}
