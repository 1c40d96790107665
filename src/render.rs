//! Visualization helpers: edge-map and corner-overlay rasters, bilinear
//! feature-map upscaling, and the contrast heatmap.
//!
//! Everything here is presentation only. The heatmap maps a scalar field
//! onto an inferno-style ramp with a legend strip; the upscaler resamples
//! a G x G feature grid to full image resolution for overlay display and
//! must not be mistaken for per-pixel-accurate texture values.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use ndarray::Array2;

use crate::buffer::PixelBuffer;
use crate::edges::EdgeMap;

/// Marker radius for corner overlays, in pixels.
const CORNER_MARKER_RADIUS: i32 = 3;
const CORNER_MARKER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Legend strip geometry for heatmaps.
const LEGEND_WIDTH: u32 = 12;
const LEGEND_GAP: u32 = 4;

/// Inferno ramp anchors, sampled uniformly over [0, 1].
const INFERNO: [[u8; 3]; 9] = [
    [0, 0, 4],
    [27, 12, 65],
    [74, 12, 107],
    [120, 28, 109],
    [165, 44, 96],
    [207, 68, 70],
    [237, 105, 37],
    [251, 155, 6],
    [252, 255, 164],
];

/// Look up the ramp color for t in [0, 1] with linear interpolation
/// between anchors.
fn ramp(t: f64) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0) * (INFERNO.len() - 1) as f64;
    let lo = t.floor() as usize;
    let hi = (lo + 1).min(INFERNO.len() - 1);
    let f = t - lo as f64;
    let mut rgb = [0u8; 3];
    for c in 0..3 {
        let v = INFERNO[lo][c] as f64 * (1.0 - f) + INFERNO[hi][c] as f64 * f;
        rgb[c] = v.round() as u8;
    }
    Rgba([rgb[0], rgb[1], rgb[2], 255])
}

/// Edge map as a raster: white edge pixels on black.
pub fn render_edge_map(edges: &EdgeMap) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(
        edges.width() as u32,
        edges.height() as u32,
        Rgba([0, 0, 0, 255]),
    );
    for row in 0..edges.height() {
        for col in 0..edges.width() {
            if edges.is_edge(row, col) {
                img.put_pixel(col as u32, row as u32, Rgba([255, 255, 255, 255]));
            }
        }
    }
    img
}

/// Original image with red markers at the detected corners.
pub fn render_corner_overlay(buffer: &PixelBuffer, corners: &[(u32, u32)]) -> RgbaImage {
    let mut img = RgbaImage::new(buffer.width() as u32, buffer.height() as u32);
    for row in 0..buffer.height() {
        for col in 0..buffer.width() {
            let px = Rgba([
                buffer.sample(row, col, 0),
                buffer.sample(row, col, 1),
                buffer.sample(row, col, 2),
                255,
            ]);
            img.put_pixel(col as u32, row as u32, px);
        }
    }
    for &(row, col) in corners {
        draw_filled_circle_mut(
            &mut img,
            (col as i32, row as i32),
            CORNER_MARKER_RADIUS,
            CORNER_MARKER_COLOR,
        );
    }
    img
}

/// Bilinear upscaling of a small sample grid to `out_h` x `out_w`.
///
/// Samples are treated as a regular lattice with align-corners mapping:
/// output index i reads source coordinate i * (n - 1) / (N - 1). The
/// output always has exactly `out_h * out_w` samples.
pub fn upscale_bilinear(grid: &Array2<f64>, out_h: usize, out_w: usize) -> Array2<f64> {
    let (gh, gw) = grid.dim();
    Array2::from_shape_fn((out_h, out_w), |(i, j)| {
        let sy = if out_h > 1 {
            i as f64 * (gh - 1) as f64 / (out_h - 1) as f64
        } else {
            0.0
        };
        let sx = if out_w > 1 {
            j as f64 * (gw - 1) as f64 / (out_w - 1) as f64
        } else {
            0.0
        };
        let y0 = sy.floor() as usize;
        let x0 = sx.floor() as usize;
        let y1 = (y0 + 1).min(gh - 1);
        let x1 = (x0 + 1).min(gw - 1);
        let fy = sy - y0 as f64;
        let fx = sx - x0 as f64;

        let top = grid[[y0, x0]] * (1.0 - fx) + grid[[y0, x1]] * fx;
        let bottom = grid[[y1, x0]] * (1.0 - fx) + grid[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

/// Render a scalar field as a color-ramped heatmap with a legend strip.
///
/// Field values are min-max normalized (a flat field renders as the
/// lowest ramp color); each sample becomes a `cell_px` square block, and
/// a vertical ramp legend is appended on the right.
pub fn render_heatmap(field: &Array2<f64>, cell_px: u32) -> RgbaImage {
    let (rows, cols) = field.dim();
    let body_w = cols as u32 * cell_px;
    let body_h = rows as u32 * cell_px;
    let total_w = body_w + LEGEND_GAP + LEGEND_WIDTH;

    let mut vmin = f64::INFINITY;
    let mut vmax = f64::NEG_INFINITY;
    for &v in field.iter() {
        vmin = vmin.min(v);
        vmax = vmax.max(v);
    }
    let range = vmax - vmin;
    let normalize = |v: f64| if range > 0.0 { (v - vmin) / range } else { 0.0 };

    let mut img = RgbaImage::from_pixel(total_w, body_h, Rgba([0, 0, 0, 0]));
    for y in 0..body_h {
        for x in 0..body_w {
            let cell = field[[(y / cell_px) as usize, (x / cell_px) as usize]];
            img.put_pixel(x, y, ramp(normalize(cell)));
        }
    }

    // Legend: max at the top, min at the bottom.
    for y in 0..body_h {
        let t = if body_h > 1 {
            1.0 - y as f64 / (body_h - 1) as f64
        } else {
            1.0
        };
        let color = ramp(t);
        for x in body_w + LEGEND_GAP..total_w {
            img.put_pixel(x, y, color);
        }
    }
    img
}
