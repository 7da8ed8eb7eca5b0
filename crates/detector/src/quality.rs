use common::span_debug;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

const VERY_BLURRY_BELOW: f64 = 50.0;
const SLIGHTLY_BLURRY_BELOW: f64 = 100.0;
const TOO_DARK_BELOW: f64 = 50.0;
const TOO_BRIGHT_ABOVE: f64 = 200.0;

const CLAHE_CLIP_LIMIT: f32 = 2.0;
const CLAHE_GRID: u32 = 8;

const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];
const KERNEL_TAPS: [(i64, i64); 9] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (0, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
const SHARPEN_WEIGHT: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityIssue {
    VeryBlurry,
    SlightlyBlurry,
    TooDark,
    TooBright,
}

impl QualityIssue {
    pub fn description(&self) -> &'static str {
        match self {
            QualityIssue::VeryBlurry => "Image is very blurry",
            QualityIssue::SlightlyBlurry => "Image is slightly blurry",
            QualityIssue::TooDark => "Image is too dark",
            QualityIssue::TooBright => "Image is too bright",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageQuality {
    /// Variance of the Laplacian response; higher is sharper.
    pub sharpness: f64,
    /// Mean gray level in `[0, 255]`.
    pub brightness: f64,
    pub issues: Vec<QualityIssue>,
    pub is_good: bool,
}

impl ImageQuality {
    pub fn assess(image: &DynamicImage) -> Self {
        let _s = span_debug!("assess_quality");

        let gray = image.to_luma8();
        let sharpness = laplacian_variance(&gray);
        let brightness = mean_brightness(&gray);

        let mut issues = Vec::new();
        if sharpness < VERY_BLURRY_BELOW {
            issues.push(QualityIssue::VeryBlurry);
        } else if sharpness < SLIGHTLY_BLURRY_BELOW {
            issues.push(QualityIssue::SlightlyBlurry);
        }
        if brightness < TOO_DARK_BELOW {
            issues.push(QualityIssue::TooDark);
        } else if brightness > TOO_BRIGHT_ABOVE {
            issues.push(QualityIssue::TooBright);
        }

        tracing::debug!(sharpness, brightness, ?issues, "Image quality assessed");

        Self {
            sharpness,
            brightness,
            is_good: issues.is_empty(),
            issues,
        }
    }
}

/// Local contrast equalization on lightness followed by a light sharpen.
pub fn enhance(image: &DynamicImage) -> DynamicImage {
    let _s = span_debug!("enhance_image");

    let equalized = equalize_lightness(&image.to_rgb8());
    DynamicImage::ImageRgb8(sharpen_blend(&equalized))
}

/// Runs CLAHE on the CIELAB lightness channel, leaving chroma untouched.
fn equalize_lightness(rgb: &RgbImage) -> RgbImage {
    let (width, height) = rgb.dimensions();
    let lab: Vec<[f32; 3]> = rgb.pixels().map(|p| srgb_to_lab(p.0)).collect();
    let index = |x: u32, y: u32| (y as usize) * (width as usize) + x as usize;

    let lightness = GrayImage::from_fn(width, height, |x, y| {
        Luma([(lab[index(x, y)][0] * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8])
    });
    let equalized = clahe(&lightness, CLAHE_CLIP_LIMIT, CLAHE_GRID);

    RgbImage::from_fn(width, height, |x, y| {
        let [_, a, b] = lab[index(x, y)];
        let l = equalized.get_pixel(x, y)[0] as f32 * 100.0 / 255.0;
        Rgb(lab_to_srgb([l, a, b]))
    })
}

/// Blends the image with its sharpened copy. Borders mirror like the
/// Laplacian so edge pixels are sharpened too.
fn sharpen_blend(original: &RgbImage) -> RgbImage {
    let (width, height) = original.dimensions();

    RgbImage::from_fn(width, height, |x, y| {
        let mut sharp = [0.0f32; 3];
        for (&k, &(dx, dy)) in SHARPEN_KERNEL.iter().zip(KERNEL_TAPS.iter()) {
            let p = original.get_pixel(
                reflect_101(x as i64 + dx, width),
                reflect_101(y as i64 + dy, height),
            );
            for c in 0..3 {
                sharp[c] += k * p[c] as f32;
            }
        }

        let base = original.get_pixel(x, y);
        Rgb(std::array::from_fn(|c| {
            let sharpened = sharp[c].round().clamp(0.0, 255.0);
            let value = base[c] as f32 * (1.0 - SHARPEN_WEIGHT) + sharpened * SHARPEN_WEIGHT;
            value.round().clamp(0.0, 255.0) as u8
        }))
    })
}

/// Contrast-limited adaptive histogram equalization over a `grid` x `grid`
/// tiling. Each tile gets its own clipped-histogram lookup table and every
/// pixel blends the tables of its four nearest tile centers.
fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tiles_x = grid.min(width);
    let tiles_y = grid.min(height);
    let span = |i: u32, len: u32, tiles: u32| {
        let start = (i as u64 * len as u64 / tiles as u64) as u32;
        let end = ((i as u64 + 1) * len as u64 / tiles as u64) as u32;
        start..end
    };

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut hist = [0u32; 256];
            let mut area = 0u32;
            for y in span(ty, height, tiles_y) {
                for x in span(tx, width, tiles_x) {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                    area += 1;
                }
            }
            luts.push(clipped_lut(hist, area, clip_limit));
        }
    }

    let tile_width = width as f32 / tiles_x as f32;
    let tile_height = height as f32 / tiles_y as f32;

    GrayImage::from_fn(width, height, |x, y| {
        let (x1, x2, wx) = neighbour_tiles(x as f32 / tile_width - 0.5, tiles_x);
        let (y1, y2, wy) = neighbour_tiles(y as f32 / tile_height - 0.5, tiles_y);
        let value = gray.get_pixel(x, y)[0] as usize;
        let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][value] as f32;

        let top = lut(x1, y1) * (1.0 - wx) + lut(x2, y1) * wx;
        let bottom = lut(x1, y2) * (1.0 - wx) + lut(x2, y2) * wx;
        Luma([(top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8])
    })
}

/// Equalization table for one tile. Counts above the limit are spread
/// evenly over all bins, the remainder one per bin at a fixed stride.
fn clipped_lut(mut hist: [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut clipped = 0;
    for bin in hist.iter_mut() {
        if *bin > limit {
            clipped += *bin - limit;
            *bin = limit;
        }
    }

    let batch = clipped / 256;
    let mut residual = clipped % 256;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual > 0 {
        let stride = (256 / residual).max(1) as usize;
        for bin in hist.iter_mut().step_by(stride) {
            if residual == 0 {
                break;
            }
            *bin += 1;
            residual -= 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut sum = 0u32;
    for (out, &count) in lut.iter_mut().zip(hist.iter()) {
        sum += count;
        *out = (sum as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

/// Lower and upper tile index around a fractional tile position, with the
/// weight of the upper one.
fn neighbour_tiles(position: f32, tiles: u32) -> (u32, u32, f32) {
    let first = position.floor();
    let weight = position - first;
    let last = tiles as i64 - 1;
    let lower = (first as i64).clamp(0, last) as u32;
    let upper = (first as i64 + 1).clamp(0, last) as u32;
    (lower, upper, weight)
}

// sRGB <-> CIELAB (D65)

const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;

fn srgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(|c| srgb_to_linear(c as f32 / 255.0));

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / WHITE_X;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > 0.008856 { 116.0 * fy - 16.0 } else { 903.3 * y };
    [l, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

fn lab_to_srgb(lab: [f32; 3]) -> [u8; 3] {
    let [l, a, b] = lab;
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let x = lab_f_inv(fx) * WHITE_X;
    let y = lab_f_inv(fy);
    let z = lab_f_inv(fz) * WHITE_Z;

    let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let g = -0.969256 * x + 1.875991 * y + 0.041556 * z;
    let b = 0.055648 * x - 0.204043 * y + 1.057311 * z;

    [r, g, b].map(|c| (linear_to_srgb(c) * 255.0).round().clamp(0.0, 255.0) as u8)
}

fn lab_f(t: f32) -> f32 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    if f > 0.206893 {
        f * f * f
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn mean_brightness(gray: &GrayImage) -> f64 {
    let count = gray.as_raw().len();
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = gray.as_raw().iter().map(|&p| p as u64).sum();
    sum as f64 / count as f64
}

/// 4-neighbour Laplacian over every pixel, mirroring across the border
/// without repeating the edge pixel.
fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let at = |x: i64, y: i64| gray.get_pixel(reflect_101(x, width), reflect_101(y, height))[0] as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let response =
                at(x, y - 1) + at(x - 1, y) + at(x + 1, y) + at(x, y + 1) - 4.0 * at(x, y);
            sum += response;
            sum_sq += response * response;
        }
    }

    let count = width as f64 * height as f64;
    let mean = sum / count;
    sum_sq / count - mean * mean
}

/// `-1 -> 1`, `len -> len - 2`; a single-pixel axis always maps to 0.
fn reflect_101(index: i64, len: u32) -> u32 {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    let mut i = index;
    while i < 0 || i >= len {
        i = if i < 0 { -i } else { 2 * (len - 1) - i };
    }
    i as u32
}
