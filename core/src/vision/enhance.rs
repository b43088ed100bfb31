use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, open};
use serde::{Deserialize, Serialize};

const LEVELS: usize = 256;

/// Pre-processing applied before separating particles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Gaussian sigma; a 7x7 kernel corresponds to roughly 1.4.
    pub blur_sigma: f32,
    pub clahe_clip_limit: f64,
    /// Tiles per axis for local equalisation.
    pub clahe_tiles: u32,
    /// Pixels strictly above this level become foreground.
    pub binary_threshold: u8,
    /// 1 gives a 3x3 structuring element.
    pub morph_radius: u8,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.4,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            binary_threshold: 20,
            morph_radius: 1,
        }
    }
}

/// Blur, equalise locally, binarise, then open and close to drop speckle and fill pinholes.
pub fn prepare_binary(source: &GrayImage, config: &EnhanceConfig) -> GrayImage {
    let blurred = if config.blur_sigma > 0.0 {
        gaussian_blur_f32(source, config.blur_sigma)
    } else {
        source.clone()
    };
    let equalized = clahe(&blurred, config.clahe_clip_limit, config.clahe_tiles);
    let binary = binarize(&equalized, config.binary_threshold);
    if config.morph_radius == 0 {
        return binary;
    }
    let opened = open(&binary, Norm::LInf, config.morph_radius);
    close(&opened, Norm::LInf, config.morph_radius)
}

pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        *p = if p.0[0] > threshold { Luma([255]) } else { Luma([0]) };
    }
    out
}

/// Contrast-limited adaptive histogram equalisation with bilinear blending between tiles.
pub fn clahe(image: &GrayImage, clip_limit: f64, tiles: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let grid_x = tiles.clamp(1, width);
    let grid_y = tiles.clamp(1, height);
    let tile_w = width.div_ceil(grid_x);
    let tile_h = height.div_ceil(grid_y);

    let mut luts = Vec::with_capacity((grid_x * grid_y) as usize);
    for ty in 0..grid_y {
        for tx in 0..grid_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(image, (x0, y0, x1, y1), clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * grid_x + tx) as usize];
    let mut out = GrayImage::new(width, height);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let value = image.get_pixel(x, y).0[0] as usize;

        let fx = (x as f64 + 0.5) / tile_w as f64 - 0.5;
        let fy = (y as f64 + 0.5) / tile_h as f64 - 0.5;
        let tx0 = fx.floor().clamp(0.0, (grid_x - 1) as f64) as u32;
        let ty0 = fy.floor().clamp(0.0, (grid_y - 1) as f64) as u32;
        let tx1 = (tx0 + 1).min(grid_x - 1);
        let ty1 = (ty0 + 1).min(grid_y - 1);
        let ax = (fx - tx0 as f64).clamp(0.0, 1.0);
        let ay = (fy - ty0 as f64).clamp(0.0, 1.0);

        let top = lut_at(tx0, ty0)[value] * (1.0 - ax) + lut_at(tx1, ty0)[value] * ax;
        let bottom = lut_at(tx0, ty1)[value] * (1.0 - ax) + lut_at(tx1, ty1)[value] * ax;
        let blended = top * (1.0 - ay) + bottom * ay;
        *px = Luma([blended.round().clamp(0.0, 255.0) as u8]);
    }
    out
}

fn tile_lut(image: &GrayImage, (x0, y0, x1, y1): (u32, u32, u32, u32), clip_limit: f64) -> [f64; LEVELS] {
    let mut hist = [0u32; LEVELS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[image.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)).max(1);

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f64 / LEVELS as f64) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }
        let share = excess / LEVELS as u32;
        let residual = (excess % LEVELS as u32) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += share;
            if i < residual {
                *bin += 1;
            }
        }
    }

    let scale = (LEVELS - 1) as f64 / area as f64;
    let mut lut = [0.0; LEVELS];
    let mut cumulative = 0u32;
    for (level, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[level] = (cumulative as f64 * scale).min(255.0);
    }
    lut
}
