//! Captcha solving state machine.
//!
//! The state machine sequences through: AcquireImages → CheckQuality → Detect
//! → Match → Validate → Click → Submit → AwaitResult. A rejected attempt goes
//! through Retry, which reloads the captcha and starts over until the attempt
//! budget runs out.

use anyhow::{anyhow, Result};
use image::GrayImage;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::browser::BrowserResult;
use crate::captcha::acquire::{
    ImageSource, height_from_style, reset_scratch_dir, url_from_style, width_from_style,
};
use crate::captcha::assignment::Assignment;
use crate::captcha::coords::{RenderedSize, click_offset};
use crate::captcha::features::FeatureExtractor;
use crate::captcha::matcher::{MatchResult, match_sprites};
use crate::captcha::region::{Region, RegionDetector};
use crate::captcha::sprite::{GlyphClassifier, QualityCheck, check_quality, save_sprites, split_strip};
use crate::config::CaptchaConfig;

/// The captcha widget as the solver needs it.
pub trait CaptchaPage {
    /// Inline style of the background element (image URL and rendered size)
    fn background_style(&self) -> BrowserResult<String>;
    /// Address of the sprite strip image
    fn sprite_url(&self) -> BrowserResult<String>;
    /// Clicks the background at an offset from its centre
    fn click_background(&self, x: i32, y: i32) -> BrowserResult<()>;
    fn submit(&self) -> BrowserResult<()>;
    /// Class attribute of the status marker shown after submitting
    fn status_class(&self) -> BrowserResult<String>;
    /// Requests a fresh captcha
    fn reload(&self) -> BrowserResult<()>;
}

/// Everything one solve needs.
pub struct SolverContext<'a> {
    pub page: &'a dyn CaptchaPage,
    pub images: &'a dyn ImageSource,
    pub detector: &'a dyn RegionDetector,
    pub classifier: &'a dyn GlyphClassifier,
    pub extractor: &'a dyn FeatureExtractor,
    pub config: &'a CaptchaConfig,
    pub scratch_dir: &'a Path,
    /// Pause after submitting and after reloading
    pub settle_delay: Duration,
}

/// Solver state machine states.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverState {
    /// Reading the page and downloading both images
    AcquireImages,
    /// Running the placeholder-glyph gate on the sprites
    CheckQuality,
    /// Locating candidate regions in the background
    Detect,
    /// Scoring regions against sprites
    Match,
    /// Checking that every sprite has its own target
    Validate,
    /// Clicking the three targets
    Click,
    /// Pressing confirm
    Submit,
    /// Reading the status marker
    AwaitResult,
    /// Attempt failed; reload and try again
    Retry(String),
    /// Status marker reported success
    Solved,
    /// Attempt budget exhausted
    GaveUp,
    /// Unrecoverable error
    Aborted(String),
}

impl std::fmt::Display for SolverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverState::AcquireImages => write!(f, "Acquiring images"),
            SolverState::CheckQuality => write!(f, "Checking sprite quality"),
            SolverState::Detect => write!(f, "Detecting regions"),
            SolverState::Match => write!(f, "Matching sprites"),
            SolverState::Validate => write!(f, "Validating assignment"),
            SolverState::Click => write!(f, "Clicking targets"),
            SolverState::Submit => write!(f, "Submitting"),
            SolverState::AwaitResult => write!(f, "Awaiting result"),
            SolverState::Retry(reason) => write!(f, "Retry: {}", reason),
            SolverState::Solved => write!(f, "Solved"),
            SolverState::GaveUp => write!(f, "Gave up"),
            SolverState::Aborted(reason) => write!(f, "Aborted: {}", reason),
        }
    }
}

/// How a solve ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved { attempts: u32 },
    GaveUp { attempts: u32 },
    Aborted(String),
}

/// Images of the current attempt.
struct CaptchaImages {
    encoded: Vec<u8>,
    background: GrayImage,
    sprites: [GrayImage; 3],
}

pub struct CaptchaSolver<'a> {
    ctx: SolverContext<'a>,
    /// Current state
    pub state: SolverState,
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts
    pub max_attempts: u32,
    images: Option<CaptchaImages>,
    regions: Vec<Region>,
    matches: MatchResult,
    assignment: Option<Assignment>,
}

impl<'a> CaptchaSolver<'a> {
    pub fn new(ctx: SolverContext<'a>) -> Self {
        let max_attempts = ctx.config.max_attempts.max(1);
        Self {
            ctx,
            state: SolverState::AcquireImages,
            attempt: 1,
            max_attempts,
            images: None,
            regions: Vec::new(),
            matches: MatchResult::new(),
            assignment: None,
        }
    }

    /// Runs the state machine to a terminal state.
    pub fn run(&mut self) -> SolveOutcome {
        while self.step() {}

        match &self.state {
            SolverState::Solved => SolveOutcome::Solved {
                attempts: self.attempt,
            },
            SolverState::Aborted(reason) => SolveOutcome::Aborted(reason.clone()),
            _ => SolveOutcome::GaveUp {
                attempts: self.attempt,
            },
        }
    }

    /// Advances the state machine by one step.
    ///
    /// Returns true while the solve should continue.
    pub fn step(&mut self) -> bool {
        match self.state.clone() {
            SolverState::AcquireImages => {
                crate::log(&format!(
                    "Attempt {}/{}: Downloading captcha images",
                    self.attempt, self.max_attempts
                ));
                self.acquire_images()
            }

            SolverState::CheckQuality => {
                let Some(images) = &self.images else {
                    return self.abort("No captcha images");
                };
                match check_quality(
                    &images.sprites,
                    self.ctx.classifier,
                    &self.ctx.config.sentinel_labels,
                ) {
                    Ok(QualityCheck::Passed) => {
                        self.state = SolverState::Detect;
                        true
                    }
                    Ok(QualityCheck::Rejected { sprite, label }) => self.retry(format!(
                        "Sprite {} rendered as placeholder {:?}",
                        sprite, label
                    )),
                    Err(e) => self.abort(&format!("Sprite classification failed: {}", e)),
                }
            }

            SolverState::Detect => {
                let Some(images) = &self.images else {
                    return self.abort("No captcha images");
                };
                match self.ctx.detector.detect(&images.encoded) {
                    Ok(regions) => {
                        crate::log(&format!(
                            "Attempt {}/{}: Detected {} regions",
                            self.attempt,
                            self.max_attempts,
                            regions.len()
                        ));
                        self.regions = regions;
                        self.state = SolverState::Match;
                        true
                    }
                    Err(e) => self.abort(&format!("Region detection failed: {}", e)),
                }
            }

            SolverState::Match => {
                let Some(images) = &self.images else {
                    return self.abort("No captcha images");
                };
                self.matches = match_sprites(
                    self.ctx.extractor,
                    &images.sprites,
                    &images.background,
                    &self.regions,
                    self.ctx.config.ratio_threshold,
                    Some(self.ctx.scratch_dir),
                );
                for (i, best) in self.matches.iter().enumerate() {
                    match best {
                        Some(m) => crate::log(&format!(
                            "Sprite {}: best region at ({}) with score {:.3}",
                            i + 1,
                            m.centroid,
                            m.score
                        )),
                        None => crate::log(&format!("Sprite {}: no candidate region", i + 1)),
                    }
                }
                self.state = SolverState::Validate;
                true
            }

            SolverState::Validate => match Assignment::from_matches(&self.matches) {
                Ok(assignment) => {
                    self.assignment = Some(assignment);
                    self.state = SolverState::Click;
                    true
                }
                Err(e) => self.retry(format!("Invalid assignment: {}", e)),
            },

            SolverState::Click => self.click_targets(),

            SolverState::Submit => {
                crate::log(&format!(
                    "Attempt {}/{}: Submitting",
                    self.attempt, self.max_attempts
                ));
                if let Err(e) = self.ctx.page.submit() {
                    return self.abort(&format!("Failed to submit: {}", e));
                }
                std::thread::sleep(self.ctx.settle_delay);
                self.state = SolverState::AwaitResult;
                true
            }

            SolverState::AwaitResult => match self.ctx.page.status_class() {
                Ok(class) if class == self.ctx.config.success_class => {
                    crate::log(&format!(
                        "Captcha solved on attempt {}/{}",
                        self.attempt, self.max_attempts
                    ));
                    self.state = SolverState::Solved;
                    false
                }
                Ok(class) => self.retry(format!("Status marker is {:?}", class)),
                Err(e) => self.abort(&format!("Failed to read status: {}", e)),
            },

            SolverState::Retry(reason) => {
                crate::log(&format!(
                    "Attempt {}/{} failed: {}",
                    self.attempt, self.max_attempts, reason
                ));

                if self.attempt >= self.max_attempts {
                    crate::log(&format!(
                        "Giving up after {} attempts",
                        self.max_attempts
                    ));
                    self.state = SolverState::GaveUp;
                    return false;
                }

                std::thread::sleep(self.ctx.config.backoff_for(self.attempt));
                if let Err(e) = self.ctx.page.reload() {
                    return self.abort(&format!("Failed to reload captcha: {}", e));
                }
                std::thread::sleep(self.ctx.settle_delay);

                self.attempt += 1;
                self.images = None;
                self.regions.clear();
                self.matches = MatchResult::new();
                self.assignment = None;
                self.state = SolverState::AcquireImages;
                true
            }

            SolverState::Solved | SolverState::GaveUp | SolverState::Aborted(_) => false,
        }
    }

    fn acquire_images(&mut self) -> bool {
        let scratch = self.ctx.scratch_dir;
        if let Err(e) = reset_scratch_dir(scratch) {
            return self.abort(&format!("Failed to prepare scratch dir: {}", e));
        }

        let style = match self.ctx.page.background_style() {
            Ok(style) => style,
            Err(e) => return self.abort(&format!("Failed to read background: {}", e)),
        };
        let sprite_url = match self.ctx.page.sprite_url() {
            Ok(url) => url,
            Err(e) => return self.abort(&format!("Failed to read sprite strip: {}", e)),
        };
        let background_url = match url_from_style(&style) {
            Ok(url) => url,
            Err(e) => return self.retry(format!("Background not ready: {}", e)),
        };

        let background_bytes = match self.ctx.images.fetch(&background_url) {
            Ok(bytes) => bytes,
            Err(e) => return self.retry(format!("Background download failed: {}", e)),
        };
        let sprite_bytes = match self.ctx.images.fetch(&sprite_url) {
            Ok(bytes) => bytes,
            Err(e) => return self.retry(format!("Sprite download failed: {}", e)),
        };

        for (name, bytes) in [("captcha.jpg", &background_bytes), ("sprite.jpg", &sprite_bytes)] {
            if let Err(e) = fs::write(scratch.join(name), bytes) {
                crate::log(&format!("Warning: Failed to save {}: {}", name, e));
            }
        }

        let background = match image::load_from_memory(&background_bytes) {
            Ok(img) => img.to_luma8(),
            Err(e) => return self.retry(format!("Background is not an image: {}", e)),
        };
        let strip = match image::load_from_memory(&sprite_bytes) {
            Ok(img) => img.to_luma8(),
            Err(e) => return self.retry(format!("Sprite strip is not an image: {}", e)),
        };

        let sprites = split_strip(&strip);
        if let Err(e) = save_sprites(&sprites, scratch) {
            crate::log(&format!("Warning: Failed to save sprites: {}", e));
        }

        self.images = Some(CaptchaImages {
            encoded: background_bytes,
            background,
            sprites,
        });
        self.state = SolverState::CheckQuality;
        true
    }

    fn click_targets(&mut self) -> bool {
        let (Some(assignment), Some(images)) = (self.assignment, &self.images) else {
            return self.abort("Nothing to click");
        };
        let raw_size = images.background.dimensions();

        for (i, target) in assignment.targets().iter().enumerate() {
            // The element may re-layout between clicks
            let style = match self.ctx.page.background_style() {
                Ok(style) => style,
                Err(e) => return self.abort(&format!("Failed to read background: {}", e)),
            };
            let rendered = match rendered_size(&style) {
                Ok(size) => size,
                Err(e) => return self.retry(format!("Background has no size: {}", e)),
            };
            let (x, y) = match click_offset(*target, raw_size, rendered) {
                Ok(offset) => offset,
                Err(e) => return self.retry(format!("Cannot place click: {}", e)),
            };

            crate::log(&format!(
                "Sprite {}: clicking ({}) at offset ({}, {})",
                i + 1,
                target,
                x,
                y
            ));
            if let Err(e) = self.ctx.page.click_background(x, y) {
                return self.abort(&format!("Failed to click sprite {}: {}", i + 1, e));
            }
        }

        self.state = SolverState::Submit;
        true
    }

    fn retry(&mut self, reason: String) -> bool {
        self.state = SolverState::Retry(reason);
        true
    }

    fn abort(&mut self, reason: &str) -> bool {
        crate::log(&format!("Captcha aborted: {}", reason));
        self.state = SolverState::Aborted(reason.to_string());
        false
    }
}

fn rendered_size(style: &str) -> Result<RenderedSize> {
    Ok(RenderedSize {
        width: width_from_style(style)?,
        height: height_from_style(style)?,
    })
}

/// Solves the captcha currently shown on the page.
///
/// Returns the number of attempts it took.
pub fn solve_captcha(ctx: SolverContext<'_>) -> Result<u32> {
    let mut solver = CaptchaSolver::new(ctx);
    match solver.run() {
        SolveOutcome::Solved { attempts } => Ok(attempts),
        SolveOutcome::GaveUp { attempts } => {
            Err(anyhow!("Captcha not solved after {} attempts", attempts))
        }
        SolveOutcome::Aborted(reason) => Err(anyhow!("Captcha aborted: {}", reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserError;
    use crate::captcha::features::Descriptor;
    use crate::captcha::region::Centroid;
    use image::{DynamicImage, ImageFormat, Luma};
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, VecDeque};
    use std::io::Cursor;
    use tempfile::tempdir;

    const SUCCESS: &str = "tc-opera pointer show-success";
    const FAILURE: &str = "tc-opera pointer show-fail";
    const STYLE: &str =
        "background-image: url(\"https://captcha.test/bg.png\"); width: 150px; height: 100px;";
    const SPRITE_URL: &str = "https://captcha.test/sprite.png";

    struct FakePage {
        statuses: RefCell<VecDeque<String>>,
        clicks: RefCell<Vec<(i32, i32)>>,
        submits: Cell<u32>,
        reloads: Cell<u32>,
        broken: bool,
    }

    impl FakePage {
        fn new(statuses: &[&str]) -> Self {
            Self {
                statuses: RefCell::new(statuses.iter().map(|s| s.to_string()).collect()),
                clicks: RefCell::new(Vec::new()),
                submits: Cell::new(0),
                reloads: Cell::new(0),
                broken: false,
            }
        }
    }

    impl CaptchaPage for FakePage {
        fn background_style(&self) -> BrowserResult<String> {
            if self.broken {
                return Err(BrowserError::Timeout {
                    locator: "xpath //*[@id=\"slideBg\"]".to_string(),
                    timeout: Duration::from_secs(15),
                });
            }
            Ok(STYLE.to_string())
        }

        fn sprite_url(&self) -> BrowserResult<String> {
            Ok(SPRITE_URL.to_string())
        }

        fn click_background(&self, x: i32, y: i32) -> BrowserResult<()> {
            self.clicks.borrow_mut().push((x, y));
            Ok(())
        }

        fn submit(&self) -> BrowserResult<()> {
            self.submits.set(self.submits.get() + 1);
            Ok(())
        }

        fn status_class(&self) -> BrowserResult<String> {
            Ok(self
                .statuses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| FAILURE.to_string()))
        }

        fn reload(&self) -> BrowserResult<()> {
            self.reloads.set(self.reloads.get() + 1);
            Ok(())
        }
    }

    struct FakeImages(HashMap<String, Vec<u8>>);

    impl ImageSource for FakeImages {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("404 for {}", url))
        }
    }

    struct FakeDetector {
        regions: Vec<Region>,
        calls: Cell<u32>,
    }

    impl RegionDetector for FakeDetector {
        fn detect(&self, _image: &[u8]) -> Result<Vec<Region>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.regions.clone())
        }
    }

    /// Returns queued labels, then "A" forever.
    struct FakeClassifier(RefCell<VecDeque<String>>);

    impl GlyphClassifier for FakeClassifier {
        fn classify(&self, _image: &GrayImage) -> Result<String> {
            Ok(self
                .0
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| "A".to_string()))
        }
    }

    struct MeanFeatures;

    impl FeatureExtractor for MeanFeatures {
        fn describe(&self, image: &GrayImage) -> Vec<Descriptor> {
            let count = (image.width() * image.height()) as usize;
            if count == 0 {
                return Vec::new();
            }
            let mean = image.pixels().map(|p| p[0] as f32).sum::<f32>() / count as f32;
            vec![vec![mean], vec![mean + 5.0]]
        }
    }

    fn png(img: &GrayImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img.clone())
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn fill(img: &mut GrayImage, region: &Region, shade: u8) {
        for y in region.y1..region.y2 {
            for x in region.x1..region.x2 {
                img.put_pixel(x, y, Luma([shade]));
            }
        }
    }

    /// Regions with shades 40, 120, 200 on a 300x200 background.
    fn scene_regions() -> Vec<Region> {
        vec![
            Region::new(20, 20, 60, 60),
            Region::new(120, 80, 160, 120),
            Region::new(220, 140, 260, 180),
        ]
    }

    /// Sprite strip whose bands are shaded 200, 40, 120.
    fn scene_images() -> FakeImages {
        let mut background = GrayImage::new(300, 200);
        for (region, shade) in scene_regions().iter().zip([40u8, 120, 200]) {
            fill(&mut background, region, shade);
        }

        let mut strip = GrayImage::new(90, 30);
        for (i, shade) in [200u8, 40, 120].into_iter().enumerate() {
            let x = i as u32 * 30;
            fill(&mut strip, &Region::new(x, 0, x + 30, 30), shade);
        }

        FakeImages(HashMap::from([
            ("https://captcha.test/bg.png".to_string(), png(&background)),
            (SPRITE_URL.to_string(), png(&strip)),
        ]))
    }

    fn detector(regions: Vec<Region>) -> FakeDetector {
        FakeDetector {
            regions,
            calls: Cell::new(0),
        }
    }

    fn classifier(labels: &[&str]) -> FakeClassifier {
        FakeClassifier(RefCell::new(labels.iter().map(|s| s.to_string()).collect()))
    }

    fn test_config() -> CaptchaConfig {
        CaptchaConfig {
            max_attempts: 3,
            retry_backoff_ms: 0,
            ..Default::default()
        }
    }

    fn expected_clicks() -> Vec<(i32, i32)> {
        let rendered = RenderedSize {
            width: 150.0,
            height: 100.0,
        };
        [
            Centroid { x: 240, y: 160 },
            Centroid { x: 40, y: 40 },
            Centroid { x: 140, y: 100 },
        ]
        .into_iter()
        .map(|c| click_offset(c, (300, 200), rendered).unwrap())
        .collect()
    }

    fn run(
        page: &FakePage,
        images: &FakeImages,
        detector: &FakeDetector,
        classifier: &FakeClassifier,
        config: &CaptchaConfig,
        scratch: &Path,
    ) -> SolveOutcome {
        let ctx = SolverContext {
            page,
            images,
            detector,
            classifier,
            extractor: &MeanFeatures,
            config,
            scratch_dir: scratch,
            settle_delay: Duration::ZERO,
        };
        CaptchaSolver::new(ctx).run()
    }

    #[test]
    fn test_solves_on_first_attempt() {
        let dir = tempdir().unwrap();
        let page = FakePage::new(&[SUCCESS]);
        let detector = detector(scene_regions());
        let config = test_config();

        let outcome = run(
            &page,
            &scene_images(),
            &detector,
            &classifier(&[]),
            &config,
            dir.path(),
        );

        assert_eq!(outcome, SolveOutcome::Solved { attempts: 1 });
        assert_eq!(*page.clicks.borrow(), expected_clicks());
        assert_eq!(page.submits.get(), 1);
        assert_eq!(page.reloads.get(), 0);
        for name in ["captcha.jpg", "sprite.jpg", "sprite_1.png", "spec_3.png"] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }
    }

    #[test]
    fn test_failure_marker_reloads_and_retries() {
        let dir = tempdir().unwrap();
        let page = FakePage::new(&[FAILURE, SUCCESS]);
        let detector = detector(scene_regions());
        let config = test_config();

        let outcome = run(
            &page,
            &scene_images(),
            &detector,
            &classifier(&[]),
            &config,
            dir.path(),
        );

        assert_eq!(outcome, SolveOutcome::Solved { attempts: 2 });
        assert_eq!(page.reloads.get(), 1);
        assert_eq!(page.clicks.borrow().len(), 6);
        assert_eq!(page.submits.get(), 2);
    }

    #[test]
    fn test_no_regions_gives_up_without_clicking() {
        let dir = tempdir().unwrap();
        let page = FakePage::new(&[]);
        let detector = detector(Vec::new());
        let config = test_config();

        let outcome = run(
            &page,
            &scene_images(),
            &detector,
            &classifier(&[]),
            &config,
            dir.path(),
        );

        assert_eq!(outcome, SolveOutcome::GaveUp { attempts: 3 });
        assert_eq!(detector.calls.get(), 3);
        assert_eq!(page.reloads.get(), 2);
        assert!(page.clicks.borrow().is_empty());
        assert_eq!(page.submits.get(), 0);
    }

    #[test]
    fn test_colliding_targets_are_not_clicked() {
        let dir = tempdir().unwrap();
        let page = FakePage::new(&[SUCCESS]);
        let detector = detector(vec![Region::new(20, 20, 60, 60)]);
        let config = CaptchaConfig {
            max_attempts: 2,
            ..test_config()
        };

        let outcome = run(
            &page,
            &scene_images(),
            &detector,
            &classifier(&[]),
            &config,
            dir.path(),
        );

        assert_eq!(outcome, SolveOutcome::GaveUp { attempts: 2 });
        assert!(page.clicks.borrow().is_empty());
    }

    #[test]
    fn test_placeholder_sprite_skips_detection() {
        let dir = tempdir().unwrap();
        let page = FakePage::new(&[SUCCESS]);
        let detector = detector(scene_regions());
        let config = test_config();

        let outcome = run(
            &page,
            &scene_images(),
            &detector,
            &classifier(&["0"]),
            &config,
            dir.path(),
        );

        assert_eq!(outcome, SolveOutcome::Solved { attempts: 2 });
        assert_eq!(detector.calls.get(), 1);
        assert_eq!(page.reloads.get(), 1);
    }

    #[test]
    fn test_browser_timeout_aborts() {
        let dir = tempdir().unwrap();
        let page = FakePage {
            broken: true,
            ..FakePage::new(&[SUCCESS])
        };
        let detector = detector(scene_regions());
        let config = test_config();

        let outcome = run(
            &page,
            &scene_images(),
            &detector,
            &classifier(&[]),
            &config,
            dir.path(),
        );

        assert!(matches!(outcome, SolveOutcome::Aborted(reason) if reason.contains("timed out")));
        assert_eq!(page.reloads.get(), 0);
        assert_eq!(detector.calls.get(), 0);
    }

    #[test]
    fn test_missing_image_retries() {
        let dir = tempdir().unwrap();
        let page = FakePage::new(&[]);
        let detector = detector(scene_regions());
        let config = test_config();

        let outcome = run(
            &page,
            &FakeImages(HashMap::new()),
            &detector,
            &classifier(&[]),
            &config,
            dir.path(),
        );

        assert_eq!(outcome, SolveOutcome::GaveUp { attempts: 3 });
        assert_eq!(detector.calls.get(), 0);
    }

    #[test]
    fn test_solve_captcha_reports_attempts() {
        let dir = tempdir().unwrap();
        let page = FakePage::new(&[SUCCESS]);
        let images = scene_images();
        let detector = detector(scene_regions());
        let classifier = classifier(&[]);
        let config = test_config();

        let ctx = SolverContext {
            page: &page,
            images: &images,
            detector: &detector,
            classifier: &classifier,
            extractor: &MeanFeatures,
            config: &config,
            scratch_dir: dir.path(),
            settle_delay: Duration::ZERO,
        };
        assert_eq!(solve_captcha(ctx).unwrap(), 1);
    }
}
