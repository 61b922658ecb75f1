//! Captcha image acquisition.
//!
//! The background scene URL and the rendered element size come out of the
//! element's inline style; both images are fetched over HTTP and written to
//! the scratch directory.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Pattern for `url(...)` with optional quotes around the address.
const URL_PATTERN: &str = r#"url\(["']?(.*?)["']?\)"#;

/// Fetches encoded image bytes by URL.
pub trait ImageSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Extracts the image address from a CSS `background` style string.
pub fn url_from_style(style: &str) -> Result<String> {
    let re = Regex::new(URL_PATTERN)?;
    re.captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| anyhow!("No url(...) in style: {}", style))
}

/// Reads `width:Npx` from an inline style.
pub fn width_from_style(style: &str) -> Result<f64> {
    px_property(style, "width")
}

/// Reads `height:Npx` from an inline style.
pub fn height_from_style(style: &str) -> Result<f64> {
    px_property(style, "height")
}

/// Parses a pixel-valued property, skipping longer names like `max-width`.
fn px_property(style: &str, name: &str) -> Result<f64> {
    let re = Regex::new(&format!(r"(?:^|[;\s]){}:\s*([\d.]+)px", regex::escape(name)))?;
    let caps = re
        .captures(style)
        .ok_or_else(|| anyhow!("No {} in style: {}", name, style))?;
    caps[1]
        .parse()
        .with_context(|| format!("Invalid {} value: {}", name, &caps[1]))
}

/// Blocking HTTP image downloader.
pub struct ImageFetcher {
    client: reqwest::blocking::Client,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ImageSource for ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let url = absolute_url(url);
        let response = self
            .client
            .get(&url)
            .header("User-Agent", "rainyun-checkin")
            .send()
            .with_context(|| format!("Failed to download {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            ));
        }

        Ok(response.bytes()?.to_vec())
    }
}

/// Protocol-relative addresses are fetched over https.
fn absolute_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

/// Empties the scratch directory, creating it if needed.
///
/// Only files and symlinks are removed; subdirectories are left alone.
pub fn reset_scratch_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create scratch dir {}", dir.display()))?;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() || file_type.is_symlink() {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
