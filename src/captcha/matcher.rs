//! Sprite-to-region similarity scoring.
//!
//! Every detected region is scored against all three sprites with a
//! nearest-neighbour ratio test; each sprite keeps its best region.

use image::GrayImage;
use std::path::Path;

use crate::captcha::features::{Descriptor, FeatureExtractor};
use crate::captcha::region::{Centroid, Region};

/// Outcome of comparing one sprite against one region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Similarity {
    /// Good correspondences over all sprite descriptors considered
    pub score: f32,
    /// Correspondences that passed the ratio test
    pub good_matches: usize,
}

impl Similarity {
    pub const NONE: Similarity = Similarity {
        score: 0.0,
        good_matches: 0,
    };
}

/// Scores how well the sprite descriptors are found among the region descriptors.
///
/// For every sprite descriptor the two nearest region descriptors are looked up;
/// the correspondence is good if the nearest is closer than `ratio` times the
/// second nearest. With fewer than two region descriptors no correspondence
/// can pass.
pub fn compute_similarity(sprite: &[Descriptor], region: &[Descriptor], ratio: f32) -> Similarity {
    if sprite.is_empty() || region.is_empty() {
        return Similarity::NONE;
    }

    let good_matches = sprite
        .iter()
        .filter(|desc| match two_nearest(desc, region) {
            Some((d1, d2)) => d1 < ratio * d2,
            None => false,
        })
        .count();

    Similarity {
        score: good_matches as f32 / sprite.len() as f32,
        good_matches,
    }
}

/// Distances to the nearest and second nearest candidate.
fn two_nearest(query: &[f32], candidates: &[Descriptor]) -> Option<(f32, f32)> {
    if candidates.len() < 2 {
        return None;
    }

    let mut best = f32::INFINITY;
    let mut second = f32::INFINITY;
    for candidate in candidates {
        let d = euclidean(query, candidate);
        if d < best {
            second = best;
            best = d;
        } else if d < second {
            second = d;
        }
    }
    Some((best, second))
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Best region found so far for one sprite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteMatch {
    pub score: f32,
    pub centroid: Centroid,
}

/// Best-scoring region per sprite (index 0..3 for sprites 1..3).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchResult {
    best: [Option<SpriteMatch>; 3],
}

impl MatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a candidate for `sprite` (0-based).
    ///
    /// The first candidate is always kept; later ones replace it only with a
    /// strictly greater score.
    pub fn offer(&mut self, sprite: usize, score: f32, centroid: Centroid) {
        let replace = match &self.best[sprite] {
            Some(current) => score > current.score,
            None => true,
        };
        if replace {
            self.best[sprite] = Some(SpriteMatch { score, centroid });
        }
    }

    /// Best match for `sprite` (0-based), if any region was seen.
    pub fn get(&self, sprite: usize) -> Option<&SpriteMatch> {
        self.best.get(sprite).and_then(|m| m.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&SpriteMatch>> {
        self.best.iter().map(|m| m.as_ref())
    }
}

/// Scores every region against every sprite and keeps the best region per sprite.
///
/// Region crops are written to `scratch` as `spec_{n}.png` when given.
pub fn match_sprites(
    extractor: &dyn FeatureExtractor,
    sprites: &[GrayImage; 3],
    background: &GrayImage,
    regions: &[Region],
    ratio: f32,
    scratch: Option<&Path>,
) -> MatchResult {
    let sprite_descriptors: Vec<Vec<Descriptor>> =
        sprites.iter().map(|s| extractor.describe(s)).collect();
    let mut result = MatchResult::new();

    for (i, region) in regions.iter().enumerate() {
        let crop = region.crop(background);
        if let Some(dir) = scratch {
            if crop.width() > 0 && crop.height() > 0 {
                let path = dir.join(format!("spec_{}.png", i + 1));
                if let Err(e) = crop.save(&path) {
                    crate::log(&format!("Failed to save {}: {}", path.display(), e));
                }
            }
        }

        let region_descriptors = extractor.describe(&crop);
        let centroid = region.centroid();

        for (sprite, descriptors) in sprite_descriptors.iter().enumerate() {
            let similarity = compute_similarity(descriptors, &region_descriptors, ratio);
            result.offer(sprite, similarity.score, centroid);
        }
    }

    result
}
