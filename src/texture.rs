//! Grid partitioning and GLCM texture features.
//!
//! The grayscale image is split into G x G near-equal cells (the last row
//! and column absorb the remainder, so no pixel is dropped). Each cell
//! gets a symmetric, normalized gray-level co-occurrence matrix at a
//! cell-size-dependent horizontal offset, from which six descriptors are
//! derived: contrast, dissimilarity, homogeneity, energy, correlation and
//! ASM.
//!
//! Cells too small to analyze (either side < 3 px) never fail the batch:
//! they are tagged `Degenerate` and collapse to zero-filled features at
//! the grid boundary. The cells are independent, so they fan out over the
//! rayon pool and join back into the grid by (row, col) position.

use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::CancelToken;
use crate::buffer::GrayBuffer;
use crate::error::{PixelscopeError, Result};

/// Sides smaller than this make a cell degenerate.
const MIN_CELL_SIDE: usize = 3;
/// Co-occurrence distance cap.
const MAX_DISTANCE: usize = 5;

/// The six GLCM descriptors of one grid cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TextureFeatures {
    pub contrast: f64,
    pub dissimilarity: f64,
    pub homogeneity: f64,
    pub energy: f64,
    pub correlation: f64,
    #[serde(rename = "ASM")]
    pub asm: f64,
}

/// Feature channels in their canonical reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Contrast,
    Dissimilarity,
    Homogeneity,
    Energy,
    Correlation,
    Asm,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 6] = [
        FeatureKind::Contrast,
        FeatureKind::Dissimilarity,
        FeatureKind::Homogeneity,
        FeatureKind::Energy,
        FeatureKind::Correlation,
        FeatureKind::Asm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::Contrast => "contrast",
            FeatureKind::Dissimilarity => "dissimilarity",
            FeatureKind::Homogeneity => "homogeneity",
            FeatureKind::Energy => "energy",
            FeatureKind::Correlation => "correlation",
            FeatureKind::Asm => "ASM",
        }
    }

    pub fn get(&self, features: &TextureFeatures) -> f64 {
        match self {
            FeatureKind::Contrast => features.contrast,
            FeatureKind::Dissimilarity => features.dissimilarity,
            FeatureKind::Homogeneity => features.homogeneity,
            FeatureKind::Energy => features.energy,
            FeatureKind::Correlation => features.correlation,
            FeatureKind::Asm => features.asm,
        }
    }
}

/// Per-cell outcome. Degenerate cells collapse to zero features at the
/// result boundary instead of failing the whole grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellOutcome {
    Valid(TextureFeatures),
    Degenerate,
}

impl CellOutcome {
    pub fn features(&self) -> TextureFeatures {
        match self {
            CellOutcome::Valid(f) => *f,
            CellOutcome::Degenerate => TextureFeatures::default(),
        }
    }
}

/// A grid cell's bounding box over the gray buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub y0: usize,
    pub x0: usize,
    pub h: usize,
    pub w: usize,
}

/// G x G feature matrix in row-major cell order. Every cell carries a
/// full feature record, zero-filled when the source patch was degenerate.
#[derive(Debug, Clone)]
pub struct RegionalGrid {
    grid_size: usize,
    cells: Vec<TextureFeatures>,
}

impl RegionalGrid {
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn cell(&self, row: usize, col: usize) -> &TextureFeatures {
        &self.cells[row * self.grid_size + col]
    }

    pub fn cells(&self) -> &[TextureFeatures] {
        &self.cells
    }

    /// Nested row-major representation for result records.
    pub fn rows(&self) -> Vec<Vec<TextureFeatures>> {
        self.cells
            .chunks(self.grid_size)
            .map(|row| row.to_vec())
            .collect()
    }

    /// Mean of each feature across all cells, degenerate ones included.
    pub fn average(&self) -> TextureFeatures {
        let n = self.cells.len() as f64;
        let mut avg = TextureFeatures::default();
        for f in &self.cells {
            avg.contrast += f.contrast;
            avg.dissimilarity += f.dissimilarity;
            avg.homogeneity += f.homogeneity;
            avg.energy += f.energy;
            avg.correlation += f.correlation;
            avg.asm += f.asm;
        }
        avg.contrast /= n;
        avg.dissimilarity /= n;
        avg.homogeneity /= n;
        avg.energy /= n;
        avg.correlation /= n;
        avg.asm /= n;
        avg
    }

    /// One feature channel as a G x G matrix.
    pub fn feature_matrix(&self, kind: FeatureKind) -> Array2<f64> {
        Array2::from_shape_fn((self.grid_size, self.grid_size), |(i, j)| {
            kind.get(self.cell(i, j))
        })
    }
}

/// Partition a W x H image into G x G row-major cells. Cell sides are
/// H div G and W div G except in the last row/column, which extend to the
/// image border to absorb the remainder.
pub fn partition(width: usize, height: usize, grid_size: usize) -> Vec<CellRect> {
    let cell_h = height / grid_size;
    let cell_w = width / grid_size;
    let mut rects = Vec::with_capacity(grid_size * grid_size);
    for i in 0..grid_size {
        let y0 = i * cell_h;
        let h = if i < grid_size - 1 {
            cell_h
        } else {
            height - y0
        };
        for j in 0..grid_size {
            let x0 = j * cell_w;
            let w = if j < grid_size - 1 { cell_w } else { width - x0 };
            rects.push(CellRect { y0, x0, h, w });
        }
    }
    rects
}

/// Co-occurrence distance for a patch: a quarter of the short side,
/// clamped to [1, 5].
fn cooccurrence_distance(rect: &CellRect) -> usize {
    (rect.h.min(rect.w) / 4).clamp(1, MAX_DISTANCE)
}

/// Compute the six GLCM descriptors for one patch of the gray buffer.
///
/// Quantizes to `levels` gray levels when below 256, builds a symmetric
/// normalized co-occurrence matrix at horizontal offset `d`, and reduces
/// it. Patches with a side below 3 px, or whose matrix ends up empty,
/// come back `Degenerate`.
pub fn glcm_features(gray: &GrayBuffer, rect: CellRect, levels: usize) -> CellOutcome {
    if rect.h < MIN_CELL_SIDE || rect.w < MIN_CELL_SIDE {
        return CellOutcome::Degenerate;
    }

    let d = cooccurrence_distance(&rect);
    if d >= rect.w {
        return CellOutcome::Degenerate;
    }

    let quantize = |v: u8| -> usize {
        if levels < 256 {
            (v as f64 * (levels - 1) as f64 / 255.0).round() as usize
        } else {
            v as usize
        }
    };

    let mut glcm = Array2::<f64>::zeros((levels, levels));
    let mut total = 0.0;
    for y in rect.y0..rect.y0 + rect.h {
        for x in rect.x0..rect.x0 + rect.w - d {
            let a = quantize(gray.get(y, x));
            let b = quantize(gray.get(y, x + d));
            glcm[[a, b]] += 1.0;
            glcm[[b, a]] += 1.0;
            total += 2.0;
        }
    }
    if total == 0.0 {
        return CellOutcome::Degenerate;
    }
    glcm.mapv_inplace(|v| v / total);

    CellOutcome::Valid(reduce_glcm(&glcm))
}

/// Derive the descriptor set from a normalized co-occurrence matrix.
fn reduce_glcm(glcm: &Array2<f64>) -> TextureFeatures {
    let n = glcm.nrows();

    let mut contrast = 0.0;
    let mut dissimilarity = 0.0;
    let mut homogeneity = 0.0;
    let mut asm = 0.0;
    let mut mu_i = 0.0;
    let mut mu_j = 0.0;
    for i in 0..n {
        for j in 0..n {
            let p = glcm[[i, j]];
            let diff = i as f64 - j as f64;
            contrast += p * diff * diff;
            dissimilarity += p * diff.abs();
            homogeneity += p / (1.0 + diff * diff);
            asm += p * p;
            mu_i += i as f64 * p;
            mu_j += j as f64 * p;
        }
    }

    let mut var_i = 0.0;
    let mut var_j = 0.0;
    for i in 0..n {
        for j in 0..n {
            let p = glcm[[i, j]];
            var_i += (i as f64 - mu_i).powi(2) * p;
            var_j += (j as f64 - mu_j).powi(2) * p;
        }
    }
    let sigma_i = var_i.sqrt();
    let sigma_j = var_j.sqrt();

    // Correlation is 0 by definition when a marginal has no variance.
    let correlation = if sigma_i < 1e-12 || sigma_j < 1e-12 {
        0.0
    } else {
        let mut corr = 0.0;
        for i in 0..n {
            for j in 0..n {
                corr += glcm[[i, j]] * (i as f64 - mu_i) * (j as f64 - mu_j);
            }
        }
        corr / (sigma_i * sigma_j)
    };

    TextureFeatures {
        contrast,
        dissimilarity,
        homogeneity,
        energy: asm.sqrt(),
        correlation,
        asm,
    }
}

/// Run the texture engine over the whole grid.
///
/// Cells are dispatched onto the rayon pool; the output order is the
/// row-major rect order regardless of completion order. The cancel token
/// is polled per cell, and a cancelled run fails with `Cancelled` without
/// delivering a partial grid.
pub fn analyze_grid(
    gray: &GrayBuffer,
    grid_size: usize,
    levels: usize,
    cancel: &CancelToken,
) -> Result<RegionalGrid> {
    let rects = partition(gray.width(), gray.height(), grid_size);

    let outcomes: Vec<CellOutcome> = rects
        .par_iter()
        .map(|&rect| {
            if cancel.is_cancelled() {
                return CellOutcome::Degenerate;
            }
            glcm_features(gray, rect, levels)
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(PixelscopeError::Cancelled);
    }

    Ok(RegionalGrid {
        grid_size,
        cells: outcomes.iter().map(|o| o.features()).collect(),
    })
}
