use anyhow::{anyhow, Result};
use image::{GrayImage, Luma, imageops};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{TesseractPaths, ensure_tesseract};
use crate::captcha::sprite::GlyphClassifier;

/// White border added around a glyph before recognition
const GLYPH_PADDING: u32 = 16;

/// Single-character recognizer backed by the Tesseract CLI.
pub struct TesseractClassifier {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
}

impl TesseractClassifier {
    pub fn new(paths: TesseractPaths) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
        }
    }

    /// Locates Tesseract (see `ensure_tesseract`) and builds a classifier.
    pub fn locate(configured: Option<&std::path::Path>) -> Result<Self> {
        Ok(Self::new(ensure_tesseract(configured)?))
    }
}

impl GlyphClassifier for TesseractClassifier {
    fn classify(&self, image: &GrayImage) -> Result<String> {
        let padded = pad_glyph(image);

        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        padded.save(temp_input.path())?;

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg("stdout");
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        let output = command
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("10") // Treat the image as a single character
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        Ok(top_prediction(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// The recognizer's full prediction without surrounding whitespace and
/// page breaks; empty when nothing was recognised.
fn top_prediction(stdout: &str) -> String {
    stdout.trim().to_string()
}

/// Surrounds the glyph with a white margin; Tesseract struggles with
/// characters touching the image edge.
fn pad_glyph(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut padded =
        GrayImage::from_pixel(w + 2 * GLYPH_PADDING, h + 2 * GLYPH_PADDING, Luma([255]));
    imageops::overlay(&mut padded, img, GLYPH_PADDING as i64, GLYPH_PADDING as i64);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_prediction() {
        assert_eq!(top_prediction("0\n\u{c}"), "0");
        assert_eq!(top_prediction("10\n"), "10");
        assert_eq!(top_prediction("  Ab\n"), "Ab");
    }

    #[test]
    fn test_blank_output_is_empty_prediction() {
        assert_eq!(top_prediction("\n\n"), "");
        assert_eq!(top_prediction(" \u{c}"), "");
    }

    #[test]
    fn test_pad_glyph() {
        let img = GrayImage::from_pixel(4, 6, Luma([0]));
        let padded = pad_glyph(&img);

        assert_eq!(padded.dimensions(), (4 + 32, 6 + 32));
        assert_eq!(padded.get_pixel(0, 0)[0], 255);
        assert_eq!(padded.get_pixel(GLYPH_PADDING, GLYPH_PADDING)[0], 0);
    }
}
