//! Harris corner detection with local-maxima peak picking.
//!
//! The response map comes from the structure tensor of smoothed gradient
//! products: R = det(M) - k * trace(M)^2 with k = 0.05. Peaks are 3x3
//! local maxima above an adaptive threshold (a fixed fraction of the
//! strongest response), thinned greedily so that no two accepted corners
//! lie closer than the configured minimum separation. When two
//! candidates conflict, the higher-response one wins.

use serde::{Deserialize, Serialize};

use crate::buffer::GrayBuffer;
use crate::edges::{gaussian_blur, sobel};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarrisSettings {
    /// Harris sensitivity constant (default: 0.05)
    pub k: f64,
    /// Gaussian window sigma for the structure tensor (default: 1.0)
    pub sigma: f64,
    /// Peaks must exceed this fraction of the maximum response (default: 0.1)
    pub threshold_rel: f64,
    /// Minimum Euclidean separation between accepted peaks in pixels (default: 5)
    pub min_distance: u32,
}

impl Default for HarrisSettings {
    fn default() -> Self {
        Self {
            k: 0.05,
            sigma: 1.0,
            threshold_rel: 0.1,
            min_distance: 5,
        }
    }
}

/// Compute the per-pixel Harris corner response over float intensities.
pub fn harris_response(gray: &GrayBuffer, settings: &HarrisSettings) -> Vec<f64> {
    let w = gray.width();
    let h = gray.height();
    let intensity = gray.to_intensity();

    let (gx, gy, _mag) = sobel(&intensity, w, h);

    let mut ixx = vec![0.0; w * h];
    let mut iyy = vec![0.0; w * h];
    let mut ixy = vec![0.0; w * h];
    for i in 0..w * h {
        ixx[i] = gx[i] * gx[i];
        iyy[i] = gy[i] * gy[i];
        ixy[i] = gx[i] * gy[i];
    }

    // Window function for the structure tensor
    let sxx = gaussian_blur(&ixx, w, h, settings.sigma);
    let syy = gaussian_blur(&iyy, w, h, settings.sigma);
    let sxy = gaussian_blur(&ixy, w, h, settings.sigma);

    let mut response = vec![0.0; w * h];
    for i in 0..w * h {
        let det = sxx[i] * syy[i] - sxy[i] * sxy[i];
        let trace = sxx[i] + syy[i];
        response[i] = det - settings.k * trace * trace;
    }
    response
}

/// Extract (row, col) peaks from a response map.
///
/// Candidates must be 3x3 local maxima with response above
/// `threshold_rel * max(response)`; they are then accepted in descending
/// response order subject to the minimum-separation rule. A map with no
/// positive response yields an empty list.
pub fn corner_peaks(
    response: &[f64],
    w: usize,
    h: usize,
    settings: &HarrisSettings,
) -> Vec<(u32, u32)> {
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let max_response = response.iter().cloned().fold(f64::MIN, f64::max);
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = settings.threshold_rel * max_response;

    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let r = response[y * w + x];
            if r <= threshold {
                continue;
            }
            let mut is_max = true;
            'window: for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dy == 0 && dx == 0 {
                        continue;
                    }
                    let ni = (y as isize + dy) as usize * w + (x as isize + dx) as usize;
                    if response[ni] > r {
                        is_max = false;
                        break 'window;
                    }
                }
            }
            if is_max {
                candidates.push((r, y, x));
            }
        }
    }

    // Strongest first; ties broken by position for determinism.
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| (a.1, a.2).cmp(&(b.1, b.2))));

    let min_sq = (settings.min_distance as i64).pow(2);
    let mut accepted: Vec<(u32, u32)> = Vec::new();
    for (_, y, x) in candidates {
        let far_enough = accepted.iter().all(|&(ay, ax)| {
            let dy = ay as i64 - y as i64;
            let dx = ax as i64 - x as i64;
            dy * dy + dx * dx >= min_sq
        });
        if far_enough {
            accepted.push((y as u32, x as u32));
        }
    }
    accepted
}

/// Detect corners in a grayscale buffer, ordered by response descending.
pub fn detect_corners(gray: &GrayBuffer, settings: &HarrisSettings) -> Vec<(u32, u32)> {
    let response = harris_response(gray, settings);
    corner_peaks(&response, gray.width(), gray.height(), settings)
}
