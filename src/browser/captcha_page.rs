//! The captcha widget as seen through Chrome.
//!
//! The widget is rendered inside an iframe; every lookup runs as a script in
//! the top-level page that reaches into the frame's document.

use serde::Deserialize;
use serde_json::Value;

use super::session::{BrowserError, BrowserResult, ChromeSession};
use crate::captcha::solver::CaptchaPage;

const BACKGROUND_XPATH: &str = r#"//*[@id="slideBg"]"#;
const SPRITE_XPATH: &str = r#"//*[@id="instruction"]/div/img"#;
const CONFIRM_XPATH: &str = r#"//*[@id="tcStatus"]/div[2]/div[2]/div/div"#;
const STATUS_XPATH: &str = r#"//*[@id="tcOperation"]"#;
const RELOAD_XPATH: &str = r#"//*[@id="reload"]"#;

/// Centre of an element in top-level page coordinates.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
struct Center {
    x: f64,
    y: f64,
}

pub struct ChromeCaptchaPage<'a> {
    session: &'a ChromeSession,
    frame_id: String,
}

impl<'a> ChromeCaptchaPage<'a> {
    /// Page for the captcha inside the iframe with the given id.
    pub fn new(session: &'a ChromeSession, frame_id: &str) -> Self {
        Self {
            session,
            frame_id: frame_id.to_string(),
        }
    }

    /// Waits until the element is rendered, then reads an attribute.
    fn attribute(&self, xpath: &str, name: &str) -> BrowserResult<String> {
        let script = attribute_script(&self.frame_id, xpath, name);
        self.session.poll(xpath, &script)
    }

    /// Waits until the element is rendered, then clicks at an offset from its centre.
    fn click_at(&self, xpath: &str, dx: i32, dy: i32) -> BrowserResult<()> {
        let center: Center = self.session.poll(xpath, &center_script(&self.frame_id, xpath))?;
        self.session
            .click_point(center.x + dx as f64, center.y + dy as f64)
    }
}

impl CaptchaPage for ChromeCaptchaPage<'_> {
    fn background_style(&self) -> BrowserResult<String> {
        self.attribute(BACKGROUND_XPATH, "style")
    }

    fn sprite_url(&self) -> BrowserResult<String> {
        self.attribute(SPRITE_XPATH, "src")
    }

    fn click_background(&self, x: i32, y: i32) -> BrowserResult<()> {
        self.click_at(BACKGROUND_XPATH, x, y)
    }

    fn submit(&self) -> BrowserResult<()> {
        self.click_at(CONFIRM_XPATH, 0, 0)
    }

    fn status_class(&self) -> BrowserResult<String> {
        self.attribute(STATUS_XPATH, "class")
    }

    fn reload(&self) -> BrowserResult<()> {
        // No wait: the button is there whenever the widget is.
        let center: Option<Center> = self
            .session
            .evaluate(&center_script(&self.frame_id, RELOAD_XPATH))?;
        let center = center.ok_or_else(|| BrowserError::NoSuchElement(RELOAD_XPATH.to_string()))?;
        self.session.click_point(center.x, center.y)
    }
}

/// Wraps `body` in a script that binds `el` to the first node matching
/// `xpath` in the frame's document (the page's own when the frame is absent)
/// and `frame` to the iframe element. Only rendered elements are bound;
/// `body` must return a `JSON.stringify`'d value.
fn frame_script(frame_id: &str, xpath: &str, body: &str) -> String {
    // JSON string literals are valid JavaScript string literals
    let frame_id = Value::from(frame_id);
    let xpath = Value::from(xpath);
    format!(
        r#"(() => {{
    const frame = document.getElementById({frame_id});
    const doc = frame && frame.contentDocument ? frame.contentDocument : document;
    const node = doc.evaluate({xpath}, doc, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    const rect = node ? node.getBoundingClientRect() : null;
    const el = rect && rect.width > 0 && rect.height > 0 ? node : null;
    if (!el) return JSON.stringify(null);
    {body}
}})()"#
    )
}

fn attribute_script(frame_id: &str, xpath: &str, name: &str) -> String {
    let name = Value::from(name);
    frame_script(
        frame_id,
        xpath,
        &format!("return JSON.stringify(el.getAttribute({name}) || \"\");"),
    )
}

fn center_script(frame_id: &str, xpath: &str) -> String {
    frame_script(
        frame_id,
        xpath,
        "const origin = frame && doc !== document ? frame.getBoundingClientRect() : { left: 0, top: 0 };
    return JSON.stringify({ x: origin.left + rect.left + rect.width / 2, y: origin.top + rect.top + rect.height / 2 });",
    )
}
