//! Keypoint descriptors for sprite/region matching.
//!
//! `GradientFeatures` finds Harris corners on a small image pyramid, assigns
//! each corner its dominant gradient orientation and describes the
//! surrounding patch with a 4x4 grid of 8-bin orientation histograms sampled
//! in the corner's own rotated frame.

use image::{GrayImage, imageops};
use std::f32::consts::TAU;

/// Feature vector for one keypoint.
pub type Descriptor = Vec<f32>;

/// Extracts keypoint descriptors from a grayscale image.
///
/// An empty result is valid and means the image has nothing to match on.
pub trait FeatureExtractor {
    fn describe(&self, image: &GrayImage) -> Vec<Descriptor>;
}

pub const DESCRIPTOR_LEN: usize = GRID * GRID * DESC_BINS;

/// Half-size of the descriptor window in pixels.
const PATCH_RADIUS: i32 = 8;
const GRID: usize = 4;
const CELL: i32 = 4;
const DESC_BINS: usize = 8;
const ORI_BINS: usize = 36;
const ORI_RADIUS: i32 = 6;
const CLIP: f32 = 0.2;

#[derive(Clone, Debug)]
pub struct GradientFeatures {
    /// Number of pyramid levels, each half the size of the previous one
    pub octaves: u32,
    /// Gaussian pre-smoothing applied at every level
    pub blur_sigma: f32,
    /// Harris detector sensitivity
    pub harris_k: f32,
    /// Corner response threshold relative to the strongest response of the level
    pub response_threshold: f32,
    /// Strongest corners kept per level
    pub max_keypoints: usize,
}

impl Default for GradientFeatures {
    fn default() -> Self {
        Self {
            octaves: 3,
            blur_sigma: 1.0,
            harris_k: 0.04,
            response_threshold: 0.01,
            max_keypoints: 200,
        }
    }
}

impl FeatureExtractor for GradientFeatures {
    fn describe(&self, image: &GrayImage) -> Vec<Descriptor> {
        let min_side = (2 * PATCH_RADIUS + 1) as u32;
        let mut level = image.clone();
        let mut descriptors = Vec::new();

        for _ in 0..self.octaves {
            let (w, h) = level.dimensions();
            if w < min_side || h < min_side {
                break;
            }

            let smoothed = imageops::blur(&level, self.blur_sigma);
            let grad = Gradients::from_image(&smoothed);

            for kp in self.keypoints(&grad) {
                let angle = dominant_orientation(&grad, kp);
                if let Some(desc) = describe_patch(&grad, kp, angle) {
                    descriptors.push(desc);
                }
            }

            level = imageops::resize(&level, w / 2, h / 2, imageops::FilterType::Triangle);
        }

        descriptors
    }
}

impl GradientFeatures {
    /// Harris corners that are local maxima, away from the border.
    fn keypoints(&self, grad: &Gradients) -> Vec<Keypoint> {
        let (w, h) = (grad.width as i32, grad.height as i32);
        let mut response = vec![0f32; grad.width * grad.height];
        let mut max_response = 0f32;

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let (mut sxx, mut syy, mut sxy) = (0f32, 0f32, 0f32);
                for wy in -1..=1 {
                    for wx in -1..=1 {
                        let (gx, gy) = grad.at(x + wx, y + wy);
                        sxx += gx * gx;
                        syy += gy * gy;
                        sxy += gx * gy;
                    }
                }
                let trace = sxx + syy;
                let r = sxx * syy - sxy * sxy - self.harris_k * trace * trace;
                response[(y * w + x) as usize] = r;
                max_response = max_response.max(r);
            }
        }

        if max_response <= 0.0 {
            return Vec::new();
        }

        let threshold = max_response * self.response_threshold;
        let margin = PATCH_RADIUS;
        let mut keypoints = Vec::new();

        for y in margin..h - margin {
            for x in margin..w - margin {
                let r = response[(y * w + x) as usize];
                if r <= threshold {
                    continue;
                }
                let is_peak = (-1..=1).all(|dy| {
                    (-1..=1).all(|dx| {
                        (dx == 0 && dy == 0) || response[((y + dy) * w + x + dx) as usize] <= r
                    })
                });
                if is_peak {
                    keypoints.push(Keypoint { x, y, response: r });
                }
            }
        }

        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        keypoints.truncate(self.max_keypoints);
        keypoints
    }
}

#[derive(Clone, Copy, Debug)]
struct Keypoint {
    x: i32,
    y: i32,
    response: f32,
}

/// Central-difference image gradients.
struct Gradients {
    width: usize,
    height: usize,
    dx: Vec<f32>,
    dy: Vec<f32>,
}

impl Gradients {
    fn from_image(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as i32, img.height() as i32);
        let px = |x: i32, y: i32| img.get_pixel(x.clamp(0, w - 1) as u32, y.clamp(0, h - 1) as u32)[0] as f32;

        let mut dx = Vec::with_capacity((w * h) as usize);
        let mut dy = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                dx.push((px(x + 1, y) - px(x - 1, y)) * 0.5);
                dy.push((px(x, y + 1) - px(x, y - 1)) * 0.5);
            }
        }

        Self {
            width: w as usize,
            height: h as usize,
            dx,
            dy,
        }
    }

    /// Gradient at (x, y), clamped to the image edge.
    fn at(&self, x: i32, y: i32) -> (f32, f32) {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        let i = y * self.width + x;
        (self.dx[i], self.dy[i])
    }
}

/// Angle of the strongest gradient direction around the keypoint, in radians.
fn dominant_orientation(grad: &Gradients, kp: Keypoint) -> f32 {
    let mut hist = [0f32; ORI_BINS];

    for v in -ORI_RADIUS..=ORI_RADIUS {
        for u in -ORI_RADIUS..=ORI_RADIUS {
            if u * u + v * v > ORI_RADIUS * ORI_RADIUS {
                continue;
            }
            let (gx, gy) = grad.at(kp.x + u, kp.y + v);
            let mag = gx.hypot(gy);
            if mag == 0.0 {
                continue;
            }
            let theta = gy.atan2(gx).rem_euclid(TAU);
            let bin = ((theta / TAU) * ORI_BINS as f32) as usize % ORI_BINS;
            hist[bin] += mag;
        }
    }

    let peak = hist
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);

    (peak as f32 + 0.5) * TAU / ORI_BINS as f32
}

/// Orientation-histogram descriptor of the patch around `kp`, rotated by `angle`.
fn describe_patch(grad: &Gradients, kp: Keypoint, angle: f32) -> Option<Descriptor> {
    let (sin, cos) = angle.sin_cos();
    let mut hist = vec![0f32; DESCRIPTOR_LEN];

    for v in -PATCH_RADIUS..PATCH_RADIUS {
        for u in -PATCH_RADIUS..PATCH_RADIUS {
            let (fu, fv) = (u as f32 + 0.5, v as f32 + 0.5);
            let ix = kp.x as f32 + fu * cos - fv * sin;
            let iy = kp.y as f32 + fu * sin + fv * cos;

            let (gx, gy) = grad.at(ix.round() as i32, iy.round() as i32);
            let mag = gx.hypot(gy);
            if mag == 0.0 {
                continue;
            }

            let theta = (gy.atan2(gx) - angle).rem_euclid(TAU);
            let bin = ((theta / TAU) * DESC_BINS as f32) as usize % DESC_BINS;
            let cx = ((u + PATCH_RADIUS) / CELL) as usize;
            let cy = ((v + PATCH_RADIUS) / CELL) as usize;
            hist[(cy * GRID + cx) * DESC_BINS + bin] += mag;
        }
    }

    if !normalize(&mut hist) {
        return None;
    }
    for value in hist.iter_mut() {
        *value = value.min(CLIP);
    }
    normalize(&mut hist);

    Some(hist)
}

/// Scales `v` to unit length. Returns false for a zero vector.
fn normalize(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}
