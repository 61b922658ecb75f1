//! Browser automation through Chrome's DevTools protocol.

pub mod captcha_page;
pub mod cookies;
pub mod session;

pub use captcha_page::ChromeCaptchaPage;
pub use session::{BrowserError, BrowserResult, ChromeOptions, ChromeSession};
