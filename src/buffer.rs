//! Normalized in-memory image representation
//!
//! Every analysis request starts from a `PixelBuffer`: a row-major `u8`
//! buffer with 1 (grayscale) or 3 (RGB) channels. Alpha and any extra
//! channels are discarded at construction, before anything enters the
//! pipeline. Buffers are immutable once built and owned by the request.

use image::{DynamicImage, GrayImage, RgbaImage};
use serde::Serialize;

use crate::error::{PixelscopeError, Result};

/// Luminance weights for the RGB -> gray reduction (ITU-R 709 primaries,
/// the same weights scikit-image's rgb2gray applies).
const LUMA_R: f64 = 0.2125;
const LUMA_G: f64 = 0.7154;
const LUMA_B: f64 = 0.0721;

/// Row-major 8-bit image with 1 or 3 channels.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Build a buffer from raw samples.
    ///
    /// Fails with `InvalidParameter` on zero dimensions, a channel count
    /// other than 1 or 3, or a data length that doesn't match W*H*C.
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PixelscopeError::InvalidParameter(format!(
                "image dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if channels != 1 && channels != 3 {
            return Err(PixelscopeError::InvalidParameter(format!(
                "unsupported channel count {} (expected 1 or 3)",
                channels
            )));
        }
        if data.len() != width * height * channels {
            return Err(PixelscopeError::InvalidParameter(format!(
                "buffer length {} does not match {}x{}x{}",
                data.len(),
                width,
                height,
                channels
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Normalize a decoded image to RGB, dropping alpha.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            width: width as usize,
            height: height as usize,
            channels: 3,
            data: rgb.into_raw(),
        }
    }

    /// Normalize an RGBA image to RGB, dropping alpha.
    pub fn from_rgba(img: &RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for pixel in img.pixels() {
            data.extend_from_slice(&pixel.0[..3]);
        }
        Self {
            width: width as usize,
            height: height as usize,
            channels: 3,
            data,
        }
    }

    /// Wrap an already-grayscale image.
    pub fn from_gray(img: &GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width: width as usize,
            height: height as usize,
            channels: 1,
            data: img.as_raw().clone(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Original shape as [H, W, C].
    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    /// Sample one channel of a pixel. For single-channel buffers the gray
    /// value is replicated to all three channels.
    pub fn sample(&self, row: usize, col: usize, channel: usize) -> u8 {
        if self.channels == 1 {
            self.data[row * self.width + col]
        } else {
            self.data[(row * self.width + col) * 3 + channel]
        }
    }

    /// Reduce to an 8-bit grayscale buffer. RGB inputs use the standard
    /// luminance weighting, rounded and clamped; grayscale inputs pass
    /// through unchanged.
    pub fn to_grayscale(&self) -> GrayBuffer {
        let data = if self.channels == 1 {
            self.data.clone()
        } else {
            self.data
                .chunks_exact(3)
                .map(|px| {
                    let luma =
                        px[0] as f64 * LUMA_R + px[1] as f64 * LUMA_G + px[2] as f64 * LUMA_B;
                    luma.round().clamp(0.0, 255.0) as u8
                })
                .collect()
        };
        GrayBuffer {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// 8-bit single-channel image, the working representation for the edge,
/// corner and texture stages.
#[derive(Debug, Clone)]
pub struct GrayBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl GrayBuffer {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.width + col]
    }

    /// Float intensities in [0, 1], the input to Canny and Harris.
    pub fn to_intensity(&self) -> Vec<f64> {
        self.data.iter().map(|&v| v as f64 / 255.0).collect()
    }
}

/// Summary statistics of a grayscale buffer.
#[derive(Debug, Clone, Serialize)]
pub struct GrayscaleStats {
    pub mean: f64,
    pub std: f64,
    pub min: u8,
    pub max: u8,
}

impl GrayscaleStats {
    /// Population mean/std plus min/max over the whole buffer.
    pub fn of(gray: &GrayBuffer) -> Self {
        let n = gray.data.len() as f64;
        let mut sum = 0.0;
        let mut min = u8::MAX;
        let mut max = u8::MIN;
        for &v in &gray.data {
            sum += v as f64;
            min = min.min(v);
            max = max.max(v);
        }
        let mean = sum / n;
        let var = gray
            .data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Self {
            mean,
            std: var.sqrt(),
            min,
            max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero_dimensions() {
        assert!(PixelBuffer::new(0, 4, 1, vec![]).is_err());
        assert!(PixelBuffer::new(4, 0, 1, vec![]).is_err());
    }

    #[test]
    fn test_new_rejects_bad_channel_count() {
        assert!(PixelBuffer::new(2, 2, 2, vec![0; 8]).is_err());
        assert!(PixelBuffer::new(2, 2, 4, vec![0; 16]).is_err());
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        assert!(PixelBuffer::new(2, 2, 3, vec![0; 11]).is_err());
    }

    #[test]
    fn test_from_rgba_drops_alpha() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([10, 20, 30, 40]));
        img.put_pixel(1, 0, image::Rgba([50, 60, 70, 80]));
        let buf = PixelBuffer::from_rgba(&img);
        assert_eq!(buf.channels(), 3);
        assert_eq!(buf.data(), &[10, 20, 30, 50, 60, 70]);
    }

    #[test]
    fn test_grayscale_passthrough_for_single_channel() {
        let buf = PixelBuffer::new(2, 2, 1, vec![1, 2, 3, 4]).unwrap();
        let gray = buf.to_grayscale();
        assert_eq!(gray.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_grayscale_luminance_weighting() {
        // Pure white stays white, pure black stays black.
        let buf = PixelBuffer::new(2, 1, 3, vec![255, 255, 255, 0, 0, 0]).unwrap();
        let gray = buf.to_grayscale();
        assert_eq!(gray.data(), &[255, 0]);

        // Green dominates the luma sum.
        let buf = PixelBuffer::new(1, 1, 3, vec![0, 255, 0]).unwrap();
        let g = buf.to_grayscale().get(0, 0);
        assert_eq!(g, (0.7154f64 * 255.0).round() as u8);
    }

    #[test]
    fn test_stats_uniform_image() {
        let buf = PixelBuffer::new(16, 16, 1, vec![128; 256]).unwrap();
        let stats = GrayscaleStats::of(&buf.to_grayscale());
        assert_eq!(stats.mean, 128.0);
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.min, 128);
        assert_eq!(stats.max, 128);
    }

    #[test]
    fn test_stats_mean_matches_arithmetic_mean() {
        let data: Vec<u8> = (0..=255).collect();
        let buf = PixelBuffer::new(16, 16, 1, data.clone()).unwrap();
        let stats = GrayscaleStats::of(&buf.to_grayscale());
        let expected = data.iter().map(|&v| v as f64).sum::<f64>() / 256.0;
        assert!((stats.mean - expected).abs() < 1e-9);
        assert_eq!(stats.min, 0);
        assert_eq!(stats.max, 255);
    }
}
