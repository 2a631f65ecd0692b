use thiserror::Error;

use vidextract_ocr::{OcrError, PreparedImage};
use vidextract_types::{LumaFrame, Region};

/// Binarization step applied after the optional contrast stretch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    Off,
    Fixed(u8),
    Otsu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub contrast_stretch: bool,
    pub threshold: Threshold,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            contrast_stretch: true,
            threshold: Threshold::Otsu,
        }
    }
}

impl SamplerConfig {
    /// Crop-only pipeline. Synthetic overlays carry their payload in raw
    /// byte values, which normalization would destroy.
    pub fn passthrough() -> Self {
        Self {
            contrast_stretch: false,
            threshold: Threshold::Off,
        }
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("overlay region resolves to an empty rectangle on a {width}x{height} frame")]
    EmptyRegion { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] OcrError),
}

/// Crops the overlay region out of a luma frame and normalizes it for
/// recognition. Pure; never mutates the frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionSampler {
    config: SamplerConfig,
}

impl RegionSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn sample(
        &self,
        frame: &LumaFrame,
        region: &Region,
    ) -> Result<PreparedImage, SampleError> {
        let rect = region
            .rect
            .resolve(frame.width(), frame.height())
            .ok_or(SampleError::EmptyRegion {
                width: frame.width(),
                height: frame.height(),
            })?;

        let stride = frame.stride();
        let data = frame.data();
        let mut pixels = Vec::with_capacity(rect.width * rect.height);
        for row in rect.y..rect.y + rect.height {
            let offset = row * stride + rect.x;
            pixels.extend_from_slice(&data[offset..offset + rect.width]);
        }

        if self.config.contrast_stretch {
            stretch_contrast(&mut pixels);
        }
        match self.config.threshold {
            Threshold::Off => {}
            Threshold::Fixed(level) => binarize(&mut pixels, level),
            Threshold::Otsu => {
                let level = otsu_level(&pixels);
                binarize(&mut pixels, level);
            }
        }

        Ok(PreparedImage::new(
            rect.width as u32,
            rect.height as u32,
            pixels,
        )?)
    }
}

fn stretch_contrast(pixels: &mut [u8]) {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for &p in pixels.iter() {
        min = min.min(p);
        max = max.max(p);
    }
    if max <= min {
        return;
    }
    let span = (max - min) as u16;
    for p in pixels.iter_mut() {
        *p = (((*p - min) as u16 * 255) / span) as u8;
    }
}

fn binarize(pixels: &mut [u8], level: u8) {
    for p in pixels.iter_mut() {
        *p = if *p >= level { 255 } else { 0 };
    }
}

/// Otsu's threshold over the 256-bin histogram: the level maximizing
/// between-class variance.
fn otsu_level(pixels: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &p in pixels {
        histogram[p as usize] += 1;
    }
    let total = pixels.len() as f64;
    if total == 0.0 {
        return 0;
    }
    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut background_weight = 0.0;
    let mut background_sum = 0.0;
    let mut best_level = 0u8;
    let mut best_variance = f64::MIN;
    for level in 0..256usize {
        background_weight += histogram[level] as f64;
        if background_weight == 0.0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0.0 {
            break;
        }
        background_sum += level as f64 * histogram[level] as f64;
        let background_mean = background_sum / background_weight;
        let foreground_mean = (weighted_sum - background_sum) / foreground_weight;
        let variance = background_weight
            * foreground_weight
            * (background_mean - foreground_mean).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }
    best_level
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidextract_types::{Corner, RegionRect};

    fn frame_with_gradient(width: u32, height: u32) -> LumaFrame {
        let mut data = Vec::with_capacity((width * height) as usize);
        for row in 0..height {
            for col in 0..width {
                data.push(((row + col) % 256) as u8);
            }
        }
        LumaFrame::from_owned(width, height, width as usize, 0, None, data).unwrap()
    }

    #[test]
    fn passthrough_crop_preserves_source_bytes() {
        let frame = frame_with_gradient(64, 8);
        let region = Region::new(RegionRect::Pixels {
            x: 10,
            y: 2,
            width: 4,
            height: 2,
        });
        let sampler = RegionSampler::new(SamplerConfig::passthrough());
        let image = sampler.sample(&frame, &region).unwrap();
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 2);
        assert_eq!(image.data(), &[12, 13, 14, 15, 13, 14, 15, 16]);
    }

    #[test]
    fn empty_region_is_rejected() {
        let frame = frame_with_gradient(32, 8);
        let region = Region::new(RegionRect::Pixels {
            x: 100,
            y: 0,
            width: 4,
            height: 4,
        });
        let err = RegionSampler::default()
            .sample(&frame, &region)
            .unwrap_err();
        assert!(matches!(err, SampleError::EmptyRegion { width: 32, .. }));
    }

    #[test]
    fn fixed_threshold_binarizes() {
        let frame = frame_with_gradient(16, 1);
        let region = Region::new(RegionRect::Anchored {
            corner: Corner::TopLeft,
            width: 16,
            height: 1,
        });
        let sampler = RegionSampler::new(SamplerConfig {
            contrast_stretch: false,
            threshold: Threshold::Fixed(8),
        });
        let image = sampler.sample(&frame, &region).unwrap();
        assert!(image.data().iter().all(|&p| p == 0 || p == 255));
        assert_eq!(image.data()[7], 0);
        assert_eq!(image.data()[8], 255);
    }

    #[test]
    fn otsu_splits_a_bimodal_histogram() {
        let pixels: Vec<u8> = std::iter::repeat_n(20u8, 100)
            .chain(std::iter::repeat_n(220u8, 100))
            .collect();
        let level = otsu_level(&pixels);
        assert!(level > 20 && level <= 220, "level was {level}");
    }
}
