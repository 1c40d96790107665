//! Canny edge detection.
//!
//! Pipeline over float intensities in [0, 1]:
//! 1. Gaussian smoothing (separable kernel, border-renormalized)
//! 2. Sobel gradients and magnitude
//! 3. Non-maximum suppression along the quantized gradient direction
//! 4. Double-threshold hysteresis linking from strong edge seeds
//!
//! Threshold contract: when `low`/`high` are left unset they are derived
//! from the gradient-magnitude distribution of the image itself.
//! `high` is the 0.90 magnitude quantile, floored at a small epsilon so
//! that floating-point residue from the smoothing pass never counts as
//! gradient, and `low = 0.4 * high`. Comparisons against the thresholds
//! are strict, so a constant image produces no edges. Explicit
//! thresholds are absolute magnitudes; `low > high` is clamped to
//! `low = high`.

use serde::{Deserialize, Serialize};

use crate::buffer::GrayBuffer;

/// Magnitude quantile used for the auto high threshold.
const HIGH_QUANTILE: f64 = 0.90;
/// Auto low threshold as a fraction of the high threshold.
const LOW_RATIO: f64 = 0.4;
/// Floor for the auto high threshold. Border-renormalized smoothing of a
/// constant image leaves magnitudes around 1e-16; anything below this is
/// numerical residue, not gradient.
const MIN_GRADIENT: f64 = 1e-6;
/// tan(22.5 deg), the boundary between direction bins.
const TAN_22_5: f64 = 0.414_213_562_373_095;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CannySettings {
    /// Gaussian smoothing sigma (default: 1.0)
    pub sigma: f64,
    /// Low hysteresis threshold; derived from magnitude statistics when unset
    pub low: Option<f64>,
    /// High hysteresis threshold; derived from magnitude statistics when unset
    pub high: Option<f64>,
}

impl Default for CannySettings {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            low: None,
            high: None,
        }
    }
}

/// Boolean edge mask, true where an edge pixel was confirmed.
#[derive(Debug, Clone)]
pub struct EdgeMap {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl EdgeMap {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_edge(&self, row: usize, col: usize) -> bool {
        self.data[row * self.width + col]
    }

    pub fn data(&self) -> &[bool] {
        &self.data
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&e| e).count()
    }
}

/// Detect edges in a grayscale buffer.
pub fn canny(gray: &GrayBuffer, settings: &CannySettings) -> EdgeMap {
    let w = gray.width();
    let h = gray.height();

    let intensity = gray.to_intensity();
    let smoothed = gaussian_blur(&intensity, w, h, settings.sigma);
    let (gx, gy, mag) = sobel(&smoothed, w, h);
    let suppressed = non_max_suppress(&gx, &gy, &mag, w, h);

    let high = settings
        .high
        .unwrap_or_else(|| quantile(&mag, HIGH_QUANTILE).max(MIN_GRADIENT));
    let mut low = settings.low.unwrap_or(high * LOW_RATIO);
    if low > high {
        low = high;
    }

    let data = hysteresis(&suppressed, w, h, low, high);
    EdgeMap {
        width: w,
        height: h,
        data,
    }
}

/// 1D Gaussian kernel with radius ceil(3*sigma), normalized to sum 1.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil().max(1.0) as usize;
    let mut kernel = Vec::with_capacity(2 * radius + 1);
    for i in 0..=2 * radius {
        let d = i as f64 - radius as f64;
        kernel.push((-d * d / (2.0 * sigma * sigma)).exp());
    }
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Separable Gaussian blur. Border taps fall outside the image and are
/// dropped, with the kernel weight renormalized over the taps that remain.
pub(crate) fn gaussian_blur(data: &[f64], w: usize, h: usize, sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return data.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = kernel.len() / 2;

    // Horizontal pass
    let mut tmp = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (k, &kv) in kernel.iter().enumerate() {
                let xi = x as isize + k as isize - radius as isize;
                if xi >= 0 && (xi as usize) < w {
                    acc += data[y * w + xi as usize] * kv;
                    weight += kv;
                }
            }
            tmp[y * w + x] = acc / weight;
        }
    }

    // Vertical pass
    let mut out = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (k, &kv) in kernel.iter().enumerate() {
                let yi = y as isize + k as isize - radius as isize;
                if yi >= 0 && (yi as usize) < h {
                    acc += tmp[yi as usize * w + x] * kv;
                    weight += kv;
                }
            }
            out[y * w + x] = acc / weight;
        }
    }
    out
}

/// 3x3 Sobel gradients with clamped borders. Returns (gx, gy, magnitude).
pub(crate) fn sobel(data: &[f64], w: usize, h: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut gx = vec![0.0; w * h];
    let mut gy = vec![0.0; w * h];
    let mut mag = vec![0.0; w * h];
    if w == 0 || h == 0 {
        return (gx, gy, mag);
    }

    let at = |y: usize, x: usize| data[y * w + x];
    for y in 0..h {
        let ym = y.saturating_sub(1);
        let yp = (y + 1).min(h - 1);
        for x in 0..w {
            let xm = x.saturating_sub(1);
            let xp = (x + 1).min(w - 1);

            let sx = (at(ym, xp) + 2.0 * at(y, xp) + at(yp, xp))
                - (at(ym, xm) + 2.0 * at(y, xm) + at(yp, xm));
            let sy = (at(yp, xm) + 2.0 * at(yp, x) + at(yp, xp))
                - (at(ym, xm) + 2.0 * at(ym, x) + at(ym, xp));

            let idx = y * w + x;
            gx[idx] = sx;
            gy[idx] = sy;
            mag[idx] = (sx * sx + sy * sy).sqrt();
        }
    }
    (gx, gy, mag)
}

/// Keep a pixel's magnitude only if it is strictly greater than its two
/// neighbors along the quantized gradient direction (4 bins). The outer
/// 1-pixel frame is suppressed to skip bounds checks on neighbor lookup.
fn non_max_suppress(gx: &[f64], gy: &[f64], mag: &[f64], w: usize, h: usize) -> Vec<f64> {
    let mut out = vec![0.0; w * h];
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            let m = mag[idx];
            if m == 0.0 {
                continue;
            }

            let dx = gx[idx];
            let dy = gy[idx];
            let abs_dx = dx.abs();
            let abs_dy = dy.abs();
            let same_sign = (dx >= 0.0 && dy >= 0.0) || (dx <= 0.0 && dy <= 0.0);

            // gy is positive downward, so a same-sign gradient points
            // down-right and its comparison neighbors sit on the main
            // diagonal; an opposite-sign gradient compares across the
            // anti-diagonal.
            let (n1, n2) = if abs_dx >= abs_dy {
                if abs_dy <= abs_dx * TAN_22_5 {
                    (mag[idx - 1], mag[idx + 1])
                } else if same_sign {
                    (mag[idx - w - 1], mag[idx + w + 1])
                } else {
                    (mag[idx - w + 1], mag[idx + w - 1])
                }
            } else if abs_dx <= abs_dy * TAN_22_5 {
                (mag[idx - w], mag[idx + w])
            } else if same_sign {
                (mag[idx - w - 1], mag[idx + w + 1])
            } else {
                (mag[idx - w + 1], mag[idx + w - 1])
            };

            if m > n1 && m > n2 {
                out[idx] = m;
            }
        }
    }
    out
}

/// Double-threshold linking: pixels above `high` seed a flood fill that
/// confirms 8-connected neighbors above `low`.
fn hysteresis(suppressed: &[f64], w: usize, h: usize, low: f64, high: f64) -> Vec<bool> {
    let mut edges = vec![false; w * h];
    let mut stack = Vec::new();

    for (idx, &m) in suppressed.iter().enumerate() {
        if m > high && !edges[idx] {
            edges[idx] = true;
            stack.push(idx);
            while let Some(i) = stack.pop() {
                let y = i / w;
                let x = i % w;
                for dy in -1isize..=1 {
                    for dx in -1isize..=1 {
                        if dy == 0 && dx == 0 {
                            continue;
                        }
                        let ny = y as isize + dy;
                        let nx = x as isize + dx;
                        if ny < 0 || nx < 0 || ny >= h as isize || nx >= w as isize {
                            continue;
                        }
                        let ni = ny as usize * w + nx as usize;
                        if !edges[ni] && suppressed[ni] > low {
                            edges[ni] = true;
                            stack.push(ni);
                        }
                    }
                }
            }
        }
    }
    edges
}

/// Value at quantile `q` (nearest-rank on the sorted data).
fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;

    fn gray_from(width: usize, height: usize, data: Vec<u8>) -> GrayBuffer {
        PixelBuffer::new(width, height, 1, data)
            .unwrap()
            .to_grayscale()
    }

    #[test]
    fn test_uniform_image_has_no_edges() {
        let gray = gray_from(16, 16, vec![128; 256]);
        let edges = canny(&gray, &CannySettings::default());
        assert_eq!(edges.count(), 0);
    }

    #[test]
    fn test_vertical_step_produces_vertical_edge() {
        // Left half dark, right half bright.
        let w = 32;
        let h = 32;
        let data: Vec<u8> = (0..w * h)
            .map(|i| if i % w < w / 2 { 20 } else { 220 })
            .collect();
        let gray = gray_from(w, h, data);
        let edges = canny(&gray, &CannySettings::default());
        assert!(edges.count() > 0);

        // All edge pixels cluster around the step column.
        for row in 0..h {
            for col in 0..w {
                if edges.is_edge(row, col) {
                    assert!(
                        (col as isize - (w / 2) as isize).unsigned_abs() <= 3,
                        "edge pixel at col {} far from the step",
                        col
                    );
                }
            }
        }
    }

    #[test]
    fn test_antidiagonal_step_produces_edges() {
        // Bright below the anti-diagonal; the gradient points down-right,
        // so suppression must compare along the main diagonal.
        let n = 32;
        let data: Vec<u8> = (0..n * n)
            .map(|i| {
                let y = i / n;
                let x = i % n;
                if x + y >= n {
                    220
                } else {
                    20
                }
            })
            .collect();
        let gray = gray_from(n, n, data);
        let edges = canny(&gray, &CannySettings::default());
        assert!(edges.count() > 0, "anti-diagonal step produced no edges");
        for row in 0..n {
            for col in 0..n {
                if edges.is_edge(row, col) {
                    assert!(
                        ((row + col) as isize - n as isize).unsigned_abs() <= 3,
                        "edge pixel at ({}, {}) far from the step",
                        row,
                        col
                    );
                }
            }
        }
    }

    #[test]
    fn test_main_diagonal_step_produces_edges() {
        // Bright at and right of the main diagonal; the gradient points
        // up-right, so suppression must compare across the anti-diagonal.
        let n = 32;
        let data: Vec<u8> = (0..n * n)
            .map(|i| {
                let y = i / n;
                let x = i % n;
                if x >= y {
                    220
                } else {
                    20
                }
            })
            .collect();
        let gray = gray_from(n, n, data);
        let edges = canny(&gray, &CannySettings::default());
        assert!(edges.count() > 0, "main-diagonal step produced no edges");
        for row in 0..n {
            for col in 0..n {
                if edges.is_edge(row, col) {
                    assert!(
                        (col as isize - row as isize).unsigned_abs() <= 3,
                        "edge pixel at ({}, {}) far from the step",
                        row,
                        col
                    );
                }
            }
        }
    }

    #[test]
    fn test_explicit_thresholds_override_auto() {
        let w = 32;
        let h = 32;
        let data: Vec<u8> = (0..w * h)
            .map(|i| if i % w < w / 2 { 20 } else { 220 })
            .collect();
        let gray = gray_from(w, h, data);

        // An absurdly high threshold suppresses everything.
        let strict = CannySettings {
            low: Some(1e6),
            high: Some(1e6),
            ..Default::default()
        };
        assert_eq!(canny(&gray, &strict).count(), 0);
    }

    #[test]
    fn test_low_above_high_is_clamped() {
        let w = 32;
        let h = 32;
        let data: Vec<u8> = (0..w * h)
            .map(|i| if i % w < w / 2 { 20 } else { 220 })
            .collect();
        let gray = gray_from(w, h, data);
        let inverted = CannySettings {
            low: Some(10.0),
            high: Some(0.1),
            ..Default::default()
        };
        // Must not hang or panic; high=0.1 with low clamped down to 0.1.
        let edges = canny(&gray, &inverted);
        assert!(edges.count() > 0);
    }

    #[test]
    fn test_edge_map_dimensions() {
        let gray = gray_from(7, 5, vec![0; 35]);
        let edges = canny(&gray, &CannySettings::default());
        assert_eq!(edges.width(), 7);
        assert_eq!(edges.height(), 5);
        assert_eq!(edges.data().len(), 35);
    }

    #[test]
    fn test_gaussian_blur_preserves_constant() {
        let data = vec![0.5; 100];
        let out = gaussian_blur(&data, 10, 10, 1.0);
        for v in out {
            assert!((v - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_quantile_bounds() {
        let vals = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&vals, 0.0), 1.0);
        assert_eq!(quantile(&vals, 1.0), 5.0);
        assert_eq!(quantile(&vals, 0.5), 3.0);
    }
}
