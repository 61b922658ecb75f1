use anyhow::{anyhow, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::log;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: Option<PathBuf>,
}

/// Returns the directory for storing downloaded trained data
pub fn get_tessdata_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rainyun-checkin")
        .join("tessdata")
}

/// Locates Tesseract and its English trained data, downloading the data if
/// no installation provides it.
pub fn ensure_tesseract(configured: Option<&Path>) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(configured)?;
    log(&format!("Tesseract found at: {}", executable.display()));

    let tessdata = match find_tessdata_dir() {
        Some(dir) => Some(dir),
        None if has_builtin_tessdata(&executable) => None,
        None => {
            let cache = get_tessdata_cache_dir();
            download_tessdata(&cache)?;
            Some(cache)
        }
    };

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable: configured path first, then PATH, then
/// common install locations.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("Configured tesseract not found: {}", path.display()));
    }

    if runs_ok(Path::new("tesseract")) {
        return Ok(PathBuf::from("tesseract"));
    }

    let common_paths = [
        "/usr/bin/tesseract",
        "/usr/local/bin/tesseract",
        "/opt/homebrew/bin/tesseract",
        r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    ];

    for path in &common_paths {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

fn runs_ok(executable: &Path) -> bool {
    std::process::Command::new(executable)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// True when tesseract already knows the English language without --tessdata-dir.
fn has_builtin_tessdata(executable: &Path) -> bool {
    std::process::Command::new(executable)
        .arg("--list-langs")
        .output()
        .map(|output| {
            output.status.success()
                && String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .any(|line| line.trim() == "eng")
        })
        .unwrap_or(false)
}

/// Finds a tessdata directory containing eng.traineddata
pub fn find_tessdata_dir() -> Option<PathBuf> {
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if p.join("eng.traineddata").exists() {
            return Some(p);
        }
        let p = p.join("tessdata");
        if p.join("eng.traineddata").exists() {
            return Some(p);
        }
    }

    let cache = get_tessdata_cache_dir();
    if cache.join("eng.traineddata").exists() {
        return Some(cache);
    }

    None
}

/// Downloads English trained data
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/eng.traineddata", TESSDATA_REPO);
    let eng_path = tessdata_dir.join("eng.traineddata");

    log("Downloading eng.traineddata...");
    fs::create_dir_all(tessdata_dir)?;

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "rainyun-checkin")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download eng.traineddata: HTTP {}",
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)?;
    file.write_all(&bytes)?;

    log(&format!(
        "Downloaded eng.traineddata ({} bytes)",
        bytes.len()
    ));

    Ok(())
}
