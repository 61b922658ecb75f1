//! Candidate puzzle-piece regions in the background image.
//!
//! The detector itself is a pretrained model living outside this crate.
//! `CommandDetector` runs it as a subprocess and reads the boxes back as JSON.

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, imageops};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

/// Axis-aligned bounding box in background pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

/// Click target inside the background image.
///
/// Two sprites resolve to the same target only when both coordinates are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Centroid {
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for Centroid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl Region {
    /// Creates a region, swapping corners if they are given in reverse order.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Center of the box, truncated to whole pixels.
    pub fn centroid(&self) -> Centroid {
        Centroid {
            x: self.x1 + self.width() / 2,
            y: self.y1 + self.height() / 2,
        }
    }

    /// Crops this region out of `img`, clamped to the image bounds.
    pub fn crop(&self, img: &GrayImage) -> GrayImage {
        let (w, h) = img.dimensions();
        let x0 = self.x1.min(w);
        let y0 = self.y1.min(h);
        let cw = self.x2.min(w) - x0;
        let ch = self.y2.min(h) - y0;
        imageops::crop_imm(img, x0, y0, cw, ch).to_image()
    }
}

/// Locates candidate puzzle pieces in an encoded background image.
pub trait RegionDetector {
    fn detect(&self, image: &[u8]) -> Result<Vec<Region>>;
}

/// Region detector backed by an external model process.
///
/// The program receives the image path as its last argument and prints a
/// JSON array of `[x1, y1, x2, y2]` boxes on stdout.
pub struct CommandDetector {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Builds a detector from a `[program, args...]` command line.
    pub fn from_command(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("Region detector command is empty"))?;
        Ok(Self::new(program, args.to_vec()))
    }
}

impl RegionDetector for CommandDetector {
    fn detect(&self, image: &[u8]) -> Result<Vec<Region>> {
        let mut input = NamedTempFile::with_suffix(".jpg")?;
        input.write_all(image)?;
        input.flush()?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(input.path())
            .output()
            .with_context(|| format!("Failed to run detector {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Region detector failed: {}", stderr.trim()));
        }

        parse_boxes(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses detector output: a JSON array of `[x1, y1, x2, y2]`.
///
/// Negative coordinates are clamped to 0.
pub fn parse_boxes(json: &str) -> Result<Vec<Region>> {
    let raw: Vec<[i64; 4]> =
        serde_json::from_str(json.trim()).context("Detector output is not a box list")?;

    Ok(raw
        .into_iter()
        .map(|[x1, y1, x2, y2]| {
            let clamp = |v: i64| v.clamp(0, u32::MAX as i64) as u32;
            Region::new(clamp(x1), clamp(y1), clamp(x2), clamp(y2))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_centroid_truncates() {
        assert_eq!(Region::new(10, 10, 30, 30).centroid(), Centroid { x: 20, y: 20 });
        assert_eq!(Region::new(0, 0, 5, 7).centroid(), Centroid { x: 2, y: 3 });
    }

    #[test]
    fn test_centroid_of_far_detector_box() {
        let regions = parse_boxes("[[3000000000, 0, 4000000000, 10]]").unwrap();
        assert_eq!(regions[0].centroid(), Centroid { x: 3500000000, y: 5 });

        let edge = Region::new(u32::MAX - 1, 0, u32::MAX, 1);
        assert_eq!(edge.centroid(), Centroid { x: u32::MAX - 1, y: 0 });
    }

    #[test]
    fn test_new_normalizes_corners() {
        let region = Region::new(30, 40, 10, 20);
        assert_eq!(region, Region { x1: 10, y1: 20, x2: 30, y2: 40 });
        assert_eq!((region.width(), region.height()), (20, 20));
    }

    #[test]
    fn test_crop_region() {
        let img = GrayImage::from_fn(100, 80, |x, y| Luma([(x + y) as u8]));
        let cropped = Region::new(10, 20, 40, 30).crop(&img);

        assert_eq!(cropped.dimensions(), (30, 10));
        assert_eq!(cropped.get_pixel(0, 0)[0], 30);
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let img = GrayImage::new(50, 50);
        assert_eq!(Region::new(40, 40, 90, 90).crop(&img).dimensions(), (10, 10));
        assert_eq!(Region::new(60, 60, 90, 90).crop(&img).dimensions(), (0, 0));
    }

    #[test]
    fn test_parse_boxes() {
        let regions = parse_boxes("[[10, 12, 40, 44], [-3, 5, 20, 25]]\n").unwrap();
        assert_eq!(
            regions,
            vec![Region::new(10, 12, 40, 44), Region::new(0, 5, 20, 25)]
        );
    }

    #[test]
    fn test_parse_empty_box_list() {
        assert!(parse_boxes("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_boxes("no boxes here").is_err());
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(CommandDetector::from_command(&[]).is_err());
    }

    #[test]
    fn test_centroid_display() {
        assert_eq!(Centroid { x: 20, y: 7 }.to_string(), "20,7");
    }
}
