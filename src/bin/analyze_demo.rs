use pixelscope::{
    analyze_basic, analyze_texture, BasicSettings, CancelToken, PixelBuffer, TextureSettings,
};

/// Synthetic checkerboard with a smooth gradient band, enough structure
/// to exercise edges, corners and texture in one pass.
fn demo_image(size: usize) -> PixelBuffer {
    let mut data = Vec::with_capacity(size * size * 3);
    for y in 0..size {
        for x in 0..size {
            let v = if x < size / 4 {
                (y * 255 / size) as u8
            } else if (y / 8 + x / 8) % 2 == 0 {
                30
            } else {
                220
            };
            data.extend_from_slice(&[v, v, v]);
        }
    }
    PixelBuffer::new(size, size, 3, data).expect("demo image dimensions are valid")
}

fn main() -> anyhow::Result<()> {
    let buffer = demo_image(128);
    let cancel = CancelToken::new();

    println!("=== Basic analysis ===");
    let basic = analyze_basic(&buffer, "demo.png", &BasicSettings::default(), &cancel)?;
    println!("Shape: {:?}", basic.shape);
    println!(
        "Color means: r={:.1} g={:.1} b={:.1}",
        basic.stats.color_means.r, basic.stats.color_means.g, basic.stats.color_means.b
    );
    println!(
        "Grayscale: mean={:.1} std={:.1} min={} max={}",
        basic.stats.grayscale.mean,
        basic.stats.grayscale.std,
        basic.stats.grayscale.min,
        basic.stats.grayscale.max
    );
    println!("Corners detected: {}", basic.corners_count);

    println!("\n=== Texture analysis ===");
    let texture = analyze_texture(&buffer, "demo.png", &TextureSettings::default(), &cancel)?;
    println!("Grid: {}x{}", texture.grid_size, texture.grid_size);
    println!(
        "Averages: {}",
        serde_json::to_string_pretty(&texture.average_texture)?
    );

    let out_dir = std::env::temp_dir();
    let edges_path = out_dir.join("pixelscope_edges.png");
    let heatmap_path = out_dir.join("pixelscope_heatmap.png");
    basic.edges_image.save(&edges_path)?;
    texture.contrast_heatmap.save(&heatmap_path)?;
    println!("\nSaved {} and {}", edges_path.display(), heatmap_path.display());

    Ok(())
}
