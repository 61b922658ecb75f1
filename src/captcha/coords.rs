//! Coordinate conversion utilities.
//!
//! Converts a click target in the raw captcha image into an offset from the
//! centre of the rendered background element, in CSS pixels.

use anyhow::{anyhow, Result};

use crate::captcha::region::Centroid;

/// On-screen size of the rendered element in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderedSize {
    pub width: f64,
    pub height: f64,
}

/// Converts an image-space target to an offset from the element centre.
///
/// The raw image is assumed to be stretched independently along each axis to
/// fill the element. Results are truncated toward zero.
pub fn click_offset(
    target: Centroid,
    raw_size: (u32, u32),
    rendered: RenderedSize,
) -> Result<(i32, i32)> {
    let (raw_width, raw_height) = raw_size;
    if raw_width == 0 || raw_height == 0 {
        return Err(anyhow!(
            "Captcha image has no area ({}x{})",
            raw_width,
            raw_height
        ));
    }

    let rel_x = target.x as f64 / raw_width as f64;
    let rel_y = target.y as f64 / raw_height as f64;

    let offset_x = -rendered.width / 2.0 + rel_x * rendered.width;
    let offset_y = -rendered.height / 2.0 + rel_y * rendered.height;

    Ok((offset_x as i32, offset_y as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(width: f64, height: f64) -> RenderedSize {
        RenderedSize { width, height }
    }

    #[test]
    fn test_scaled_down_element() {
        let offset = click_offset(Centroid { x: 100, y: 150 }, (400, 300), size(200.0, 150.0));
        assert_eq!(offset.unwrap(), (-50, 0));
    }

    #[test]
    fn test_doubling_rendered_size_doubles_offset() {
        let target = Centroid { x: 100, y: 75 };
        let small = click_offset(target, (400, 300), size(200.0, 160.0)).unwrap();
        let large = click_offset(target, (400, 300), size(400.0, 320.0)).unwrap();

        assert_eq!(small, (-50, -40));
        assert_eq!(large, (small.0 * 2, small.1 * 2));
    }

    #[test]
    fn test_corners() {
        let raw = (340, 242);
        let rendered = size(340.0, 242.0);
        assert_eq!(click_offset(Centroid { x: 0, y: 0 }, raw, rendered).unwrap(), (-170, -121));
        assert_eq!(click_offset(Centroid { x: 340, y: 242 }, raw, rendered).unwrap(), (170, 121));
    }

    #[test]
    fn test_truncates_toward_zero() {
        // -100 + 33/400*200 = -83.5 -> -83
        let offset = click_offset(Centroid { x: 33, y: 150 }, (400, 300), size(200.0, 150.0));
        assert_eq!(offset.unwrap(), (-83, 0));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        assert!(click_offset(Centroid { x: 0, y: 0 }, (0, 300), size(200.0, 150.0)).is_err());
    }
}
