use anyhow::{Context, Result};
use fast_image_resize as fr;
use fr::images::Image;
use rustdct::DctPlanner;

use crate::shared::constants;

/// Sum of absolute pixel-wise differences between two equal-size grayscale
/// buffers. Unbounded and resolution-dependent: the caller tunes the
/// scene-change threshold per input resolution.
pub fn pixel_diff_sum(a: &[u8], b: &[u8]) -> u64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x as i16 - y as i16).unsigned_abs() as u64)
        .sum()
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// SIMD resize of a single-channel buffer (same resizer the decoder path
/// uses for RGB).
pub fn resize_gray(data: &[u8], width: u32, height: u32, dst_w: u32, dst_h: u32) -> Result<Vec<u8>> {
    let src = Image::from_vec_u8(width, height, data.to_vec(), fr::PixelType::U8)
        .with_context(|| format!("bad grayscale buffer for {}x{} image", width, height))?;
    let mut dst = Image::new(dst_w, dst_h, fr::PixelType::U8);
    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src, &mut dst, None)
        .context("grayscale resize failed")?;
    Ok(dst.buffer().to_vec())
}

/// DCT perceptual hash of a grayscale image.
///
/// Downsample to 32x32, 2-D DCT-II, keep the top-left 8x8 coefficient block,
/// threshold each coefficient against the block median. Near-identical images
/// hash equal; the dedup test is plain equality (Hamming distance 0).
pub fn phash(gray: &[u8], width: u32, height: u32) -> Result<u64> {
    let side = constants::PHASH_RESIZE as usize;
    let small = resize_gray(gray, width, height, constants::PHASH_RESIZE, constants::PHASH_RESIZE)?;

    let mut grid: Vec<f32> = small.iter().map(|&v| v as f32).collect();
    let mut planner = DctPlanner::<f32>::new();
    let dct = planner.plan_dct2(side);

    for row in grid.chunks_exact_mut(side) {
        dct.process_dct2(row);
    }
    let mut col = vec![0f32; side];
    for x in 0..side {
        for y in 0..side {
            col[y] = grid[y * side + x];
        }
        dct.process_dct2(&mut col);
        for y in 0..side {
            grid[y * side + x] = col[y];
        }
    }

    let mut low = [0f32; 64];
    for y in 0..8 {
        for x in 0..8 {
            low[y * 8 + x] = grid[y * side + x];
        }
    }
    let mut sorted = low;
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = (sorted[31] + sorted[32]) / 2.0;

    let mut hash = 0u64;
    for (i, &v) in low.iter().enumerate() {
        if v > median {
            hash |= 1 << i;
        }
    }
    Ok(hash)
}

const SSIM_WIN: usize = 7;
const SSIM_C1: f64 = 6.5025; // (0.01 * 255)^2
const SSIM_C2: f64 = 58.5225; // (0.03 * 255)^2

/// Mean structural similarity between two equal-size grayscale buffers.
///
/// Uniform 7x7 windows, sample (N-1) variance, dynamic range 255. Result is
/// in [-1, 1], 1.0 for identical inputs. Inputs must already be equal size;
/// the dedup stage resizes both images to 300x300 before calling this.
pub fn ssim(a: &[u8], b: &[u8], width: usize, height: usize) -> f64 {
    debug_assert_eq!(a.len(), width * height);
    debug_assert_eq!(b.len(), width * height);

    if width < SSIM_WIN || height < SSIM_WIN {
        // Image smaller than the window: single global window.
        return ssim_window(a, b, 0, 0, width, height, width);
    }

    let mut total = 0.0;
    let mut windows = 0u64;
    for y in 0..=height - SSIM_WIN {
        for x in 0..=width - SSIM_WIN {
            total += ssim_window(a, b, x, y, SSIM_WIN, SSIM_WIN, width);
            windows += 1;
        }
    }
    total / windows as f64
}

fn ssim_window(a: &[u8], b: &[u8], x0: usize, y0: usize, w: usize, h: usize, stride: usize) -> f64 {
    let n = (w * h) as f64;
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for y in y0..y0 + h {
        let row = y * stride;
        for x in x0..x0 + w {
            let px = a[row + x] as f64;
            let py = b[row + x] as f64;
            sx += px;
            sy += py;
            sxx += px * px;
            syy += py * py;
            sxy += px * py;
        }
    }
    let mx = sx / n;
    let my = sy / n;
    // Sample normalization; windows of a single pixel have no variance.
    let norm = if n > 1.0 { n - 1.0 } else { 1.0 };
    let vx = (sxx - n * mx * mx) / norm;
    let vy = (syy - n * my * my) / norm;
    let cxy = (sxy - n * mx * my) / norm;

    ((2.0 * mx * my + SSIM_C1) * (2.0 * cxy + SSIM_C2))
        / ((mx * mx + my * my + SSIM_C1) * (vx + vy + SSIM_C2))
}

/// 8x8x8-bin BGR histogram of an interleaved 3-channel buffer.
pub fn bgr_histogram(bgr: &[u8]) -> Vec<f64> {
    let bins = constants::HISTOGRAM_BINS_PER_CHANNEL;
    let mut hist = vec![0f64; bins * bins * bins];
    for px in bgr.chunks_exact(3) {
        let b = (px[0] as usize * bins) >> 8;
        let g = (px[1] as usize * bins) >> 8;
        let r = (px[2] as usize * bins) >> 8;
        hist[(b * bins + g) * bins + r] += 1.0;
    }
    hist
}

/// Pearson correlation between the color histograms of two BGR buffers
/// (HISTCMP_CORREL semantics). Scale-invariant, so the two images need not
/// share a resolution and no explicit normalization step is required.
pub fn histogram_correlation(a_bgr: &[u8], b_bgr: &[u8]) -> f64 {
    pearson(&bgr_histogram(a_bgr), &bgr_histogram(b_bgr))
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let ma = a.iter().sum::<f64>() / n;
    let mb = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - ma;
        let dy = y - mb;
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }
    let denom = (va * vb).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    cov / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: usize, height: usize, period: usize) -> Vec<u8> {
        let mut buf = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                if (x / period + y / period) % 2 == 0 {
                    buf[y * width + x] = 255;
                }
            }
        }
        buf
    }

    #[test]
    fn test_pixel_diff_symmetric() {
        let a = vec![10u8, 200, 30, 40];
        let b = vec![90u8, 20, 50, 40];
        assert_eq!(pixel_diff_sum(&a, &b), pixel_diff_sum(&b, &a));
        assert_eq!(pixel_diff_sum(&a, &b), 80 + 180 + 20);
    }

    #[test]
    fn test_pixel_diff_identical_is_zero() {
        let a = checker(16, 16, 4);
        assert_eq!(pixel_diff_sum(&a, &a), 0);
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0b1111, 0), 4);
        assert_eq!(hamming_distance(u64::MAX, 0), 64);
    }

    #[test]
    fn test_phash_identical_images_hash_equal() {
        let img = checker(64, 48, 8);
        let h1 = phash(&img, 64, 48).unwrap();
        let h2 = phash(&img, 64, 48).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_phash_distinguishes_structure() {
        let a = checker(64, 64, 8);
        let b: Vec<u8> = (0..64u32 * 64)
            .map(|i| ((i % 64) * 4) as u8) // horizontal gradient
            .collect();
        let ha = phash(&a, 64, 64).unwrap();
        let hb = phash(&b, 64, 64).unwrap();
        assert_ne!(ha, hb);
    }

    #[test]
    fn test_ssim_identical_is_one() {
        let img = checker(32, 32, 4);
        let score = ssim(&img, &img, 32, 32);
        assert!((score - 1.0).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_ssim_different_below_one() {
        let a = checker(32, 32, 4);
        let b = vec![128u8; 32 * 32];
        let score = ssim(&a, &b, 32, 32);
        assert!(score < 0.9, "got {}", score);
    }

    #[test]
    fn test_histogram_correlation_identical() {
        let img: Vec<u8> = (0..32 * 32 * 3).map(|i| (i % 251) as u8).collect();
        let score = histogram_correlation(&img, &img);
        assert!((score - 1.0).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_histogram_correlation_disjoint_colors() {
        let dark = vec![10u8; 16 * 16 * 3];
        let bright = vec![245u8; 16 * 16 * 3];
        let score = histogram_correlation(&dark, &bright);
        assert!(score < 0.5, "got {}", score);
    }
}
