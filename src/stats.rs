//! Global color statistics: per-channel means and 256-bin histograms.
//!
//! All counts are exact (no sampling). Single-channel buffers are treated
//! as if replicated to three channels, so the R/G/B figures always exist.

use serde::Serialize;

use crate::buffer::{GrayBuffer, PixelBuffer};

/// Arithmetic mean of each color channel over all pixels, in [0, 255].
#[derive(Debug, Clone, Serialize)]
pub struct ColorMeans {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// 256-bin count histograms for each color channel plus the grayscale
/// reduction. `bins` is the shared 0..=255 intensity axis.
#[derive(Debug, Clone, Serialize)]
pub struct Histograms {
    pub r: Vec<u32>,
    pub g: Vec<u32>,
    pub b: Vec<u32>,
    pub gray: Vec<u32>,
    pub bins: Vec<u32>,
}

pub fn color_means(buffer: &PixelBuffer) -> ColorMeans {
    let n = (buffer.width() * buffer.height()) as f64;
    let mut sums = [0.0f64; 3];
    for row in 0..buffer.height() {
        for col in 0..buffer.width() {
            for (c, sum) in sums.iter_mut().enumerate() {
                *sum += buffer.sample(row, col, c) as f64;
            }
        }
    }
    ColorMeans {
        r: sums[0] / n,
        g: sums[1] / n,
        b: sums[2] / n,
    }
}

pub fn histograms(buffer: &PixelBuffer, gray: &GrayBuffer) -> Histograms {
    let mut r = vec![0u32; 256];
    let mut g = vec![0u32; 256];
    let mut b = vec![0u32; 256];
    for row in 0..buffer.height() {
        for col in 0..buffer.width() {
            r[buffer.sample(row, col, 0) as usize] += 1;
            g[buffer.sample(row, col, 1) as usize] += 1;
            b[buffer.sample(row, col, 2) as usize] += 1;
        }
    }

    let mut gray_hist = vec![0u32; 256];
    for &v in gray.data() {
        gray_hist[v as usize] += 1;
    }

    Histograms {
        r,
        g,
        b,
        gray: gray_hist,
        bins: (0..256).collect(),
    }
}
