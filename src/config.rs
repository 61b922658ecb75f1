//! Configuration types for the check-in run.
//!
//! Loads settings from config.json at startup, then applies environment
//! overrides (credentials, timeouts, browser location). Provides site URLs,
//! browser timing, and captcha solver tuning.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Captcha solver settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Maximum number of solve attempts before giving up
    pub max_attempts: u32,
    /// Delay before reloading a rejected captcha (milliseconds)
    pub retry_backoff_ms: u64,
    /// Double the reload delay after every failed attempt
    pub exponential_backoff: bool,
    /// Upper bound for the reload delay (milliseconds)
    pub max_backoff_ms: u64,
    /// Nearest/second-nearest distance ratio for accepting a descriptor match
    pub ratio_threshold: f32,
    /// Classifier labels that mark a sprite as a blank placeholder; an empty
    /// label means nothing was recognised
    pub sentinel_labels: Vec<String>,
    /// Region detector program followed by its arguments; the image path is appended
    pub detector_command: Vec<String>,
    /// Explicit tesseract executable (searched on PATH when unset)
    pub tesseract_path: Option<PathBuf>,
    /// Class attribute of the status marker after a successful submit
    pub success_class: String,
    /// Directory for captcha scratch images
    pub scratch_dir: Option<PathBuf>,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_backoff_ms: 1000,
            exponential_backoff: true,
            max_backoff_ms: 30000,
            ratio_threshold: 0.8,
            sentinel_labels: vec!["0".to_string(), "1".to_string(), String::new()],
            detector_command: vec!["captcha-detect".to_string()],
            tesseract_path: None,
            success_class: "tc-opera pointer show-success".to_string(),
            scratch_dir: None,
        }
    }
}

impl CaptchaConfig {
    /// Returns the reload delay after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.retry_backoff_ms;
        let delay = if self.exponential_backoff {
            let shift = attempt.saturating_sub(1).min(16);
            base.saturating_mul(1u64 << shift)
        } else {
            base
        };
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Account name (overridden by RAINYUN_USER)
    pub user: String,
    /// Account password (overridden by RAINYUN_PWD)
    pub password: String,
    /// Dashboard origin, without trailing slash
    pub base_url: String,
    /// Run Chrome headless
    pub headless: bool,
    /// Chrome/Chromium binary, when not the autodetected one
    pub chrome_binary: Option<PathBuf>,
    /// Maximum time to wait for an element to become visible (seconds)
    pub wait_timeout_secs: u64,
    /// Fixed pause after navigation and captcha actions (milliseconds)
    pub settle_delay_ms: u64,
    /// HTTP timeout for captcha image downloads (seconds)
    pub download_timeout_secs: u64,
    /// Show the browser window even when headless is set
    pub debug: bool,
    pub captcha: CaptchaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            base_url: "https://app.rainyun.com".to_string(),
            headless: true,
            chrome_binary: None,
            wait_timeout_secs: 15,
            settle_delay_ms: 5000,
            download_timeout_secs: 30,
            debug: false,
            captcha: CaptchaConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Builds an absolute URL on the dashboard origin.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Applies environment overrides using the given variable lookup.
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user) = var("RAINYUN_USER") {
            self.user = user;
        }
        if let Some(pwd) = var("RAINYUN_PWD") {
            self.password = pwd;
        }
        if let Some(bin) = var("CHROME_BIN") {
            self.chrome_binary = Some(PathBuf::from(bin));
        }
        if let Some(timeout) = var("TIMEOUT") {
            match timeout.trim().parse() {
                Ok(secs) => self.wait_timeout_secs = secs,
                Err(_) => crate::log(&format!("Ignoring invalid TIMEOUT value: {}", timeout)),
            }
        }
        if let Some(debug) = var("DEBUG") {
            self.debug = parse_flag(&debug);
        }
        if let Some(linux) = var("LINUX_MODE") {
            self.headless = parse_flag(&linux);
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Loads configuration from the given path or returns defaults.
fn load_file(config_path: &Path) -> AppConfig {
    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if !config_path.exists() {
        crate::log(&format!(
            "{} not found. Using default config.",
            config_path.display()
        ));
        return AppConfig::default();
    }

    match read_file(config_path) {
        Ok(config) => {
            crate::log(&format!("Config loaded from {}", config_path.display()));
            config
        }
        Err(e) => {
            crate::log(&format!("{:#}. Using defaults.", e));
            AppConfig::default()
        }
    }
}

fn read_file(config_path: &Path) -> anyhow::Result<AppConfig> {
    let contents = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", config_path.display()))
}

/// Loads configuration and applies environment overrides.
///
/// Looks for config.json next to the executable unless a path is given.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(crate::paths::get_config_path);
    let mut config = load_file(&config_path);
    config.apply_overrides(|name| std::env::var(name).ok());
    config
}
