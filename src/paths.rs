use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the default config path: `<exe_dir>/config.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Returns the cookie store: `<exe_dir>/cookies.json`
pub fn get_cookie_file() -> PathBuf {
    get_exe_dir().join("cookies.json")
}

/// Returns the default scratch directory for captcha images:
/// `<cache_dir>/rainyun-checkin/temp/`, or `<exe_dir>/temp/` when the
/// platform has no cache directory.
pub fn get_default_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("rainyun-checkin"))
        .unwrap_or_else(|| get_exe_dir().clone())
        .join("temp")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    Ok(())
}
