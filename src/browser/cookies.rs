//! Session cookie persistence between runs.

use anyhow::{Context, Result};
use headless_chrome::protocol::cdp::Network::CookieParam;
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::session::ChromeSession;
use crate::log;

/// Fields stripped before a stored cookie is set again.
const STRIPPED_FIELDS: [&str; 3] = ["sameSite", "expires", "expiry"];

/// Writes every cookie of the current session to `path`.
pub fn save_cookies(session: &ChromeSession, path: &Path) -> Result<()> {
    let cookies = serde_json::to_value(session.cookies()?)?;
    let count = cookies.as_array().map_or(0, Vec::len);
    write_cookie_file(path, &cookies)?;
    log(&format!("Saved {} cookies to {}", count, path.display()));
    Ok(())
}

/// Restores cookies from `path` into the session.
///
/// The browser must be on the cookie's domain before cookies can be set, so
/// `base_url` is opened first. Returns false when there is nothing to load.
pub fn load_cookies(session: &ChromeSession, base_url: &str, path: &Path) -> Result<bool> {
    if !path.exists() {
        log("No cookie file found");
        return Ok(false);
    }

    let cookies = read_cookie_file(path)?;
    session.goto(base_url)?;

    let mut added = 0;
    for cookie in cookies {
        let name = cookie["name"].as_str().unwrap_or("?").to_string();
        let result = cookie_param(cookie).and_then(|param| Ok(session.set_cookie(param)?));
        match result {
            Ok(()) => added += 1,
            Err(e) => log(&format!("Failed to add cookie {}: {:#}", name, e)),
        }
    }

    log(&format!("Loaded {} cookies", added));
    Ok(true)
}

fn write_cookie_file(path: &Path, cookies: &Value) -> Result<()> {
    let json = serde_json::to_string_pretty(cookies)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_cookie_file(path: &Path) -> Result<Vec<Value>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid cookie file {}", path.display()))
}

/// Turns a stored cookie back into settable form, dropping the fields
/// Chrome rejects on restore.
fn cookie_param(mut cookie: Value) -> Result<CookieParam> {
    if let Some(fields) = cookie.as_object_mut() {
        for key in STRIPPED_FIELDS {
            fields.remove(key);
        }
    }
    serde_json::from_value(cookie).context("Malformed cookie")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn stored_cookie() -> Value {
        json!({
            "name": "rain-session",
            "value": "abc",
            "domain": ".rainyun.com",
            "path": "/",
            "expires": 1893456000.0,
            "size": 15,
            "httpOnly": true,
            "secure": true,
            "session": false,
            "sameSite": "Lax",
            "priority": "Medium",
        })
    }

    #[test]
    fn test_cookie_param_drops_rejected_fields() {
        let param = cookie_param(stored_cookie()).unwrap();

        assert_eq!(param.name, "rain-session");
        assert_eq!(param.value, "abc");
        assert_eq!(param.domain.as_deref(), Some(".rainyun.com"));
        assert_eq!(param.http_only, Some(true));
        assert!(param.same_site.is_none());
        assert!(param.expires.is_none());
    }

    #[test]
    fn test_cookie_without_name_is_rejected() {
        assert!(cookie_param(json!({ "value": "abc" })).is_err());
        assert!(cookie_param(json!("not a cookie")).is_err());
    }

    #[test]
    fn test_cookie_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let cookies = json!([stored_cookie(), { "name": "b", "value": "2" }]);

        write_cookie_file(&path, &cookies).unwrap();
        assert_eq!(Value::Array(read_cookie_file(&path).unwrap()), cookies);
    }

    #[test]
    fn test_corrupt_cookie_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(read_cookie_file(&path).is_err());
    }
}
