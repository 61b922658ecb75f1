//! Sprite strip splitting and the render-quality gate.
//!
//! The instruction strip holds the three reference sprites side by side.
//! When the captcha renders badly the sprites come out as blank placeholder
//! glyphs; a single-character recognizer is used to spot those.

use anyhow::Result;
use image::{GrayImage, imageops};
use std::path::Path;

/// Recognizes a single glyph and returns its top prediction.
pub trait GlyphClassifier {
    fn classify(&self, image: &GrayImage) -> Result<String>;
}

/// Result of the quality gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QualityCheck {
    Passed,
    /// Sprite (1-based) was classified as a placeholder glyph
    Rejected { sprite: usize, label: String },
}

/// Horizontal `[start, end)` bounds of the three sprites in a strip of `width` pixels.
///
/// Each band is `width / 3` wide; remainder pixels go to the last band.
pub fn band_bounds(width: u32) -> [(u32, u32); 3] {
    let band = width / 3;
    [(0, band), (band, 2 * band), (2 * band, width)]
}

/// Splits the sprite strip into its three sprites.
pub fn split_strip(strip: &GrayImage) -> [GrayImage; 3] {
    let height = strip.height();
    band_bounds(strip.width())
        .map(|(start, end)| imageops::crop_imm(strip, start, 0, end - start, height).to_image())
}

/// Saves the sprites as `sprite_{n}.png` in `dir`.
pub fn save_sprites(sprites: &[GrayImage; 3], dir: &Path) -> Result<()> {
    for (i, sprite) in sprites.iter().enumerate() {
        sprite.save(dir.join(format!("sprite_{}.png", i + 1)))?;
    }
    Ok(())
}

/// Classifies each sprite in order and rejects the captcha on the first
/// placeholder label.
pub fn check_quality(
    sprites: &[GrayImage; 3],
    classifier: &dyn GlyphClassifier,
    sentinels: &[String],
) -> Result<QualityCheck> {
    for (i, sprite) in sprites.iter().enumerate() {
        let label = classifier.classify(sprite)?;
        crate::log(&format!("Sprite {} classified as {:?}", i + 1, label));
        if sentinels.iter().any(|s| *s == label) {
            return Ok(QualityCheck::Rejected {
                sprite: i + 1,
                label,
            });
        }
    }
    Ok(QualityCheck::Passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use image::Luma;
    use std::cell::Cell;
    use crate::config::CaptchaConfig;
    use tempfile::tempdir;

    #[test]
    fn test_band_bounds_even_width() {
        assert_eq!(band_bounds(300), [(0, 100), (100, 200), (200, 300)]);
    }

    #[test]
    fn test_band_bounds_remainder_goes_last() {
        assert_eq!(band_bounds(301), [(0, 100), (100, 200), (200, 301)]);
        assert_eq!(band_bounds(302), [(0, 100), (100, 200), (200, 302)]);
    }

    #[test]
    fn test_band_widths_sum_to_width() {
        for width in 0..50 {
            let total: u32 = band_bounds(width).iter().map(|(s, e)| e - s).sum();
            assert_eq!(total, width);
        }
    }

    #[test]
    fn test_split_strip() {
        let strip = GrayImage::from_fn(301, 20, |x, _| Luma([(x / 100) as u8]));
        let sprites = split_strip(&strip);

        assert_eq!(sprites[0].dimensions(), (100, 20));
        assert_eq!(sprites[1].dimensions(), (100, 20));
        assert_eq!(sprites[2].dimensions(), (101, 20));
        assert_eq!(sprites[1].get_pixel(0, 0)[0], 1);
        assert_eq!(sprites[2].get_pixel(100, 0)[0], 3);
    }

    #[test]
    fn test_save_sprites() {
        let dir = tempdir().unwrap();
        let sprites = split_strip(&GrayImage::new(30, 10));
        save_sprites(&sprites, dir.path()).unwrap();

        for n in 1..=3 {
            assert!(dir.path().join(format!("sprite_{}.png", n)).exists());
        }
    }

    /// Returns labels in order and counts calls.
    struct ScriptedClassifier {
        labels: Vec<&'static str>,
        calls: Cell<usize>,
    }

    impl GlyphClassifier for ScriptedClassifier {
        fn classify(&self, _image: &GrayImage) -> Result<String> {
            let i = self.calls.get();
            self.calls.set(i + 1);
            Ok(self.labels[i].to_string())
        }
    }

    fn sentinels() -> Vec<String> {
        vec!["0".to_string(), "1".to_string()]
    }

    #[test]
    fn test_quality_passes_without_placeholders() {
        let classifier = ScriptedClassifier {
            labels: vec!["a", "7", "Q"],
            calls: Cell::new(0),
        };
        let sprites = split_strip(&GrayImage::new(30, 10));

        let check = check_quality(&sprites, &classifier, &sentinels()).unwrap();
        assert_eq!(check, QualityCheck::Passed);
        assert_eq!(classifier.calls.get(), 3);
    }

    #[test]
    fn test_quality_rejects_on_first_placeholder() {
        let classifier = ScriptedClassifier {
            labels: vec!["a", "1", "0"],
            calls: Cell::new(0),
        };
        let sprites = split_strip(&GrayImage::new(30, 10));

        let check = check_quality(&sprites, &classifier, &sentinels()).unwrap();
        assert_eq!(
            check,
            QualityCheck::Rejected {
                sprite: 2,
                label: "1".to_string()
            }
        );
        assert_eq!(classifier.calls.get(), 2);
    }

    #[test]
    fn test_default_sentinels_reject_unrecognised_sprite() {
        let classifier = ScriptedClassifier {
            labels: vec!["10", ""],
            calls: Cell::new(0),
        };
        let sprites = split_strip(&GrayImage::new(30, 10));
        let defaults = CaptchaConfig::default().sentinel_labels;

        let check = check_quality(&sprites, &classifier, &defaults).unwrap();
        assert_eq!(
            check,
            QualityCheck::Rejected {
                sprite: 2,
                label: String::new()
            }
        );
    }

    struct BrokenClassifier;

    impl GlyphClassifier for BrokenClassifier {
        fn classify(&self, _image: &GrayImage) -> Result<String> {
            Err(anyhow!("recognizer unavailable"))
        }
    }

    #[test]
    fn test_classifier_failure_is_an_error() {
        let sprites = split_strip(&GrayImage::new(30, 10));
        assert!(check_quality(&sprites, &BrokenClassifier, &sentinels()).is_err());
    }
}
