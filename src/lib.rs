//! pixelscope: an image-analysis engine.
//!
//! Turns a raw pixel buffer into quantitative descriptors and visual
//! overlays along two independent paths:
//! - **Basic**: per-channel means and histograms, grayscale statistics, a
//!   Canny edge map and a Harris corner overlay.
//! - **Texture**: a G x G grid of GLCM descriptors (contrast,
//!   dissimilarity, homogeneity, energy, correlation, ASM) with averages,
//!   a contrast heatmap and a full-resolution upscaled contrast map.
//!
//! Decoding images from disk formats and encoding results for transport
//! are collaborator responsibilities; the engine works on `PixelBuffer`
//! in and pixel buffers out. Use `AnalysisService` for async dispatch
//! with the one-in-flight-per-kind guard, or call the `analysis`
//! functions directly for synchronous use.

pub mod analysis;
pub mod buffer;
pub mod corners;
pub mod edges;
pub mod error;
pub mod render;
pub mod service;
pub mod stats;
pub mod texture;

pub use analysis::{
    analyze_basic, analyze_texture, BasicAnalysisResult, BasicSettings, CancelToken,
    TextureAnalysisResult, TextureSettings,
};
pub use buffer::{GrayBuffer, GrayscaleStats, PixelBuffer};
pub use corners::{detect_corners, HarrisSettings};
pub use edges::{canny, CannySettings, EdgeMap};
pub use error::{PixelscopeError, Result};
pub use service::{AnalysisService, RequestState};
pub use texture::{FeatureKind, RegionalGrid, TextureFeatures};
