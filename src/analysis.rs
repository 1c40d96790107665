//! Analysis entry points and result records.
//!
//! Two independent synchronous operations over one immutable
//! `PixelBuffer`:
//! - **Basic**: color means, histograms, grayscale stats, Canny edge map
//!   and Harris corner overlay.
//! - **Texture**: G x G regional GLCM features, per-feature averages, a
//!   contrast heatmap and a full-resolution upscaled contrast map.
//!
//! Result records serialize for a UI frontend; raster outputs stay as
//! in-memory pixel buffers because transport encoding is a collaborator
//! concern. Both operations poll a cooperative `CancelToken` between
//! their long-running sub-steps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::buffer::{GrayscaleStats, PixelBuffer};
use crate::corners::{detect_corners, HarrisSettings};
use crate::edges::{canny, CannySettings};
use crate::error::{PixelscopeError, Result};
use crate::render;
use crate::stats::{color_means, histograms, ColorMeans, Histograms};
use crate::texture::{analyze_grid, FeatureKind, TextureFeatures};

/// Pixels-per-cell scale for the contrast heatmap raster.
const HEATMAP_CELL_PX: u32 = 32;

/// Cooperative cancellation flag, polled between sub-steps and between
/// grid cells. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PixelscopeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Parameters for Basic analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicSettings {
    pub canny: CannySettings,
    pub harris: HarrisSettings,
}

/// Parameters for Texture analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureSettings {
    /// Grid size G, one of 4/8/12/16 (default: 8)
    pub grid_size: usize,
    /// Nominal patch size, one of 11/21/31/41 (default: 21). Advisory
    /// only: the co-occurrence distance derives from actual cell size.
    pub patch_size: usize,
    /// Co-occurrence level count, 64 or 256 (default: 256)
    pub levels: usize,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            grid_size: 8,
            patch_size: 21,
            levels: 256,
        }
    }
}

impl TextureSettings {
    pub fn validate(&self) -> Result<()> {
        if ![4, 8, 12, 16].contains(&self.grid_size) {
            return Err(PixelscopeError::InvalidParameter(format!(
                "grid_size must be one of 4/8/12/16, got {}",
                self.grid_size
            )));
        }
        if ![11, 21, 31, 41].contains(&self.patch_size) {
            return Err(PixelscopeError::InvalidParameter(format!(
                "patch_size must be one of 11/21/31/41, got {}",
                self.patch_size
            )));
        }
        if ![64, 256].contains(&self.levels) {
            return Err(PixelscopeError::InvalidParameter(format!(
                "levels must be 64 or 256, got {}",
                self.levels
            )));
        }
        Ok(())
    }
}

/// Mean and histogram section of the Basic record.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSection {
    pub color_means: ColorMeans,
    pub grayscale: GrayscaleStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct BasicAnalysisResult {
    /// Opaque passthrough of the caller's filename
    pub filename: String,
    /// Original shape as [H, W, C]
    pub shape: [usize; 3],
    pub stats: StatsSection,
    pub histogram: Histograms,
    /// Detected corner coordinates as (row, col)
    pub corners: Vec<(u32, u32)>,
    pub corners_count: usize,
    /// RFC 3339 completion timestamp
    pub analyzed_at: String,
    /// Edge map raster (white on black); encoding is the caller's job
    #[serde(skip)]
    pub edges_image: RgbaImage,
    /// Source image with corner markers
    #[serde(skip)]
    pub corners_image: RgbaImage,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextureAnalysisResult {
    pub filename: String,
    pub grid_size: usize,
    pub patch_size: usize,
    /// Feature names in cell-record order
    pub features_list: Vec<&'static str>,
    /// G x G grid, row-major; every cell carries a full feature record
    pub regional_texture: Vec<Vec<TextureFeatures>>,
    /// Per-feature mean across all cells
    pub average_texture: TextureFeatures,
    pub analyzed_at: String,
    /// Contrast heatmap of the raw grid with legend strip
    #[serde(skip)]
    pub contrast_heatmap: RgbaImage,
    /// Contrast channel bilinearly upscaled to image resolution
    /// (visualization only)
    #[serde(skip)]
    pub contrast_map: Array2<f64>,
}

/// Run the Basic analysis path over one buffer.
pub fn analyze_basic(
    buffer: &PixelBuffer,
    filename: &str,
    settings: &BasicSettings,
    cancel: &CancelToken,
) -> Result<BasicAnalysisResult> {
    let gray = buffer.to_grayscale();

    let means = color_means(buffer);
    let hists = histograms(buffer, &gray);
    let gray_stats = GrayscaleStats::of(&gray);

    cancel.checkpoint()?;
    let edges = canny(&gray, &settings.canny);
    let edges_image = render::render_edge_map(&edges);

    cancel.checkpoint()?;
    let corners = detect_corners(&gray, &settings.harris);
    let corners_image = render::render_corner_overlay(buffer, &corners);

    Ok(BasicAnalysisResult {
        filename: filename.to_string(),
        shape: buffer.shape(),
        stats: StatsSection {
            color_means: means,
            grayscale: gray_stats,
        },
        histogram: hists,
        corners_count: corners.len(),
        corners,
        analyzed_at: chrono::Utc::now().to_rfc3339(),
        edges_image,
        corners_image,
    })
}

/// Run the Texture analysis path over one buffer.
pub fn analyze_texture(
    buffer: &PixelBuffer,
    filename: &str,
    settings: &TextureSettings,
    cancel: &CancelToken,
) -> Result<TextureAnalysisResult> {
    settings.validate()?;

    let gray = buffer.to_grayscale();
    let grid = analyze_grid(&gray, settings.grid_size, settings.levels, cancel)?;

    cancel.checkpoint()?;
    let contrast_grid = grid.feature_matrix(FeatureKind::Contrast);
    let contrast_heatmap = render::render_heatmap(&contrast_grid, HEATMAP_CELL_PX);
    let contrast_map = render::upscale_bilinear(&contrast_grid, gray.height(), gray.width());

    Ok(TextureAnalysisResult {
        filename: filename.to_string(),
        grid_size: settings.grid_size,
        patch_size: settings.patch_size,
        features_list: FeatureKind::ALL.iter().map(|f| f.name()).collect(),
        regional_texture: grid.rows(),
        average_texture: grid.average(),
        analyzed_at: chrono::Utc::now().to_rfc3339(),
        contrast_heatmap,
        contrast_map,
    })
}
