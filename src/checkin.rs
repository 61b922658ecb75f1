//! Login and daily reward claim.
//!
//! Login first tries the stored session cookies and falls back to the
//! password form. The captcha may appear on login and always appears when
//! the reward is claimed.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::PathBuf;

use crate::browser::cookies::{load_cookies, save_cookies};
use crate::browser::{BrowserError, ChromeCaptchaPage, ChromeOptions, ChromeSession};
use crate::captcha::{CommandDetector, GradientFeatures, ImageFetcher, SolverContext, solve_captcha};
use crate::config::AppConfig;
use crate::log;
use crate::ocr::TesseractClassifier;
use crate::paths::{get_cookie_file, get_default_scratch_dir};

const CAPTCHA_FRAME_ID: &str = "tcaptcha_iframe_dy";
const CAPTCHA_FRAME_XPATH: &str = r#"//*[@id="tcaptcha_iframe_dy"]"#;
const USER_FIELD_XPATH: &str = r#"//*[@name="login-field"]"#;
const PASSWORD_FIELD_XPATH: &str = r#"//*[@name="login-password"]"#;
const LOGIN_BUTTON_XPATH: &str =
    r#"//*[@id="app"]/div[1]/div[1]/div/div[2]/fade/div/div/span/form/button"#;
const REWARD_XPATH: &str =
    "//span[contains(text(), '每日签到')]/ancestor::div[1]//a[contains(text(), '领取奖励')]";
const POINTS_XPATH: &str =
    r#"//*[@id="app"]/div[1]/div[3]/div[2]/div/div/div[2]/div[1]/div[1]/div/p/div/h3"#;

/// Points per yuan when redeeming.
const POINTS_PER_YUAN: f64 = 2000.0;

/// Captcha collaborators, built once per run.
struct CaptchaTools {
    images: ImageFetcher,
    detector: CommandDetector,
    classifier: TesseractClassifier,
    extractor: GradientFeatures,
    scratch_dir: PathBuf,
}

impl CaptchaTools {
    fn new(config: &AppConfig) -> Result<Self> {
        let captcha = &config.captcha;
        Ok(Self {
            images: ImageFetcher::new(config.download_timeout())?,
            detector: CommandDetector::from_command(&captcha.detector_command)?,
            classifier: TesseractClassifier::locate(captcha.tesseract_path.as_deref())
                .context("Captcha solving needs Tesseract")?,
            extractor: GradientFeatures::default(),
            scratch_dir: captcha
                .scratch_dir
                .clone()
                .unwrap_or_else(get_default_scratch_dir),
        })
    }

    /// Waits for the captcha iframe and solves the widget inside it.
    fn solve_in_frame(&self, session: &ChromeSession, config: &AppConfig) -> Result<u32> {
        session.wait_for(CAPTCHA_FRAME_XPATH)?;

        let page = ChromeCaptchaPage::new(session, CAPTCHA_FRAME_ID);
        solve_captcha(SolverContext {
            page: &page,
            images: &self.images,
            detector: &self.detector,
            classifier: &self.classifier,
            extractor: &self.extractor,
            config: &config.captcha,
            scratch_dir: &self.scratch_dir,
            settle_delay: config.settle_delay(),
        })
    }
}

/// Logs in, claims the daily reward and returns the point balance.
///
/// The browser is closed whatever the outcome.
pub fn run_checkin(config: &AppConfig) -> Result<u64> {
    if config.user.is_empty() || config.password.is_empty() {
        return Err(anyhow!(
            "Credentials missing: set RAINYUN_USER and RAINYUN_PWD or fill in config.json"
        ));
    }

    let tools = CaptchaTools::new(config)?;

    log("Starting browser");
    let session = ChromeSession::launch(&chrome_options(config), config.wait_timeout())
        .context("Failed to start Chrome")?;

    let result = checkin(&session, config, &tools);

    session.quit();
    result
}

/// Debug runs show the browser window.
fn chrome_options(config: &AppConfig) -> ChromeOptions {
    ChromeOptions {
        headless: config.headless && !config.debug,
        binary: config.chrome_binary.clone(),
    }
}

fn checkin(session: &ChromeSession, config: &AppConfig, tools: &CaptchaTools) -> Result<u64> {
    let logged_in = cookie_login(session, config)? || password_login(session, config, tools)?;
    if !logged_in {
        return Err(anyhow!("Login failed"));
    }

    claim_reward(session, config, tools)?;

    let points = read_points(session)?;
    log(&format!(
        "Current points: {} (about {:.2} yuan)",
        points,
        points_to_yuan(points)
    ));
    Ok(points)
}

/// Restores the stored session and checks that it still reaches the dashboard.
fn cookie_login(session: &ChromeSession, config: &AppConfig) -> Result<bool> {
    let loaded = match load_cookies(session, &config.base_url, &get_cookie_file()) {
        Ok(loaded) => loaded,
        Err(e) => {
            log(&format!("Failed to load cookies: {:#}", e));
            false
        }
    };
    if !loaded {
        return Ok(false);
    }

    let dashboard = config.url("/dashboard");
    session.goto(&dashboard)?;
    std::thread::sleep(config.settle_delay());

    let logged_in = is_dashboard(&session.current_url(), &dashboard);
    if logged_in {
        log("Cookies are valid, already logged in");
    } else {
        log("Cookies expired, logging in again");
    }
    Ok(logged_in)
}

fn password_login(session: &ChromeSession, config: &AppConfig, tools: &CaptchaTools) -> Result<bool> {
    log("Logging in with password");
    session.goto(&config.url("/auth/login"))?;

    let form = (|| {
        let user = session.wait_for(USER_FIELD_XPATH)?;
        let password = session.wait_for(PASSWORD_FIELD_XPATH)?;
        let button = session.wait_for(LOGIN_BUTTON_XPATH)?;
        Ok::<_, BrowserError>((user, password, button))
    })();
    let (user, password, button) = match form {
        Ok(form) => form,
        Err(BrowserError::Timeout { .. }) => {
            log("Login page did not load in time; try a longer TIMEOUT");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    session.type_into(&user, &config.user)?;
    session.type_into(&password, &config.password)?;
    session.click(&button)?;

    match session.wait_for(CAPTCHA_FRAME_XPATH) {
        Ok(_) => {
            log("Login triggered a captcha");
            tools.solve_in_frame(session, config)?;
        }
        Err(BrowserError::Timeout { .. }) => log("No captcha on login"),
        Err(e) => return Err(e.into()),
    }

    std::thread::sleep(config.settle_delay());

    let dashboard = config.url("/dashboard");
    if !is_dashboard(&session.current_url(), &dashboard) {
        log("Login did not reach the dashboard");
        return Ok(false);
    }

    log("Login successful");
    if let Err(e) = save_cookies(session, &get_cookie_file()) {
        log(&format!("Warning: Failed to save cookies: {:#}", e));
    }
    Ok(true)
}

fn claim_reward(session: &ChromeSession, config: &AppConfig, tools: &CaptchaTools) -> Result<()> {
    log("Opening the earn points page");
    session.goto(&config.url("/account/reward/earn"))?;

    let earn = session
        .wait_for(REWARD_XPATH)
        .context("Daily check-in reward not found (already claimed today?)")?;
    log("Claiming daily check-in reward");
    session.click(&earn)?;

    let attempts = tools.solve_in_frame(session, config)?;
    log(&format!("Reward captcha solved in {} attempt(s)", attempts));
    Ok(())
}

fn read_points(session: &ChromeSession) -> Result<u64> {
    let element = session.wait_for(POINTS_XPATH)?;
    parse_points(&session.inner_text(&element)?)
}

/// True when the browser sits on the dashboard rather than a login redirect.
fn is_dashboard(current: &str, dashboard: &str) -> bool {
    !current.contains("login") && current == dashboard
}

/// Reads a point balance by concatenating every digit run in the text,
/// so thousands separators and surrounding labels are ignored.
pub fn parse_points(raw: &str) -> Result<u64> {
    let re = Regex::new(r"\d+")?;
    let digits: String = re.find_iter(raw).map(|m| m.as_str()).collect();
    if digits.is_empty() {
        return Err(anyhow!("No digits in point balance: {:?}", raw));
    }
    digits
        .parse()
        .with_context(|| format!("Point balance out of range: {}", digits))
}

pub fn points_to_yuan(points: u64) -> f64 {
    points as f64 / POINTS_PER_YUAN
}
