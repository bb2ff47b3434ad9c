use crate::config::ScreenshotConfig;
use crate::recorder::channel::{RecordingError, RecordingResult};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

/// Quality ladder for JPEG encoding
#[derive(Debug, Clone, Copy)]
pub struct JpegBudget {
    pub target_bytes: u64,
    pub start_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
}

impl From<&ScreenshotConfig> for JpegBudget {
    fn from(config: &ScreenshotConfig) -> Self {
        Self {
            target_bytes: config.target_size_kb * 1024,
            start_quality: config.start_quality,
            quality_step: config.quality_step.max(1),
            min_quality: config.min_quality.max(1),
        }
    }
}

/// Encode `image` as JPEG, lowering quality until it fits the budget.
///
/// Stops at the quality floor even if the result is still too large.
pub fn encode_jpeg(image: &RgbImage, budget: JpegBudget) -> RecordingResult<Vec<u8>> {
    let mut quality = budget.start_quality.clamp(1, 100);

    loop {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode_image(image)
            .map_err(|e| RecordingError::EncodingError(e.to_string()))?;

        if bytes.len() as u64 <= budget.target_bytes || quality <= budget.min_quality {
            tracing::trace!("Encoded JPEG at quality {} ({} bytes)", quality, bytes.len());
            return Ok(bytes);
        }

        quality = quality
            .saturating_sub(budget.quality_step)
            .max(budget.min_quality);
    }
}
