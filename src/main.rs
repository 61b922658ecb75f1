//! Rainyun daily check-in.
//!
//! Logs into the Rainyun dashboard through headless Chrome, claims the daily
//! check-in reward and solves the icon-click captcha guarding it.

mod browser;
mod captcha;
mod checkin;
mod config;
mod ocr;
mod paths;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::captcha::assignment::Assignment;
use crate::captcha::matcher::match_sprites;
use crate::captcha::region::RegionDetector;
use crate::captcha::sprite::{QualityCheck, check_quality, split_strip};
use crate::captcha::{CommandDetector, GradientFeatures};
use crate::config::{AppConfig, load_config};
use crate::ocr::TesseractClassifier;

const LOG_FILE: &str = "rainyun_checkin.log";

#[derive(Parser)]
#[command(version, about = "Rainyun daily check-in")]
struct Cli {
    /// Path to config.json (defaults to the one next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and claim the daily reward (default)
    Run,
    /// Solve saved captcha images offline and print the click targets
    Solve {
        /// Background scene image
        #[arg(long)]
        background: PathBuf,
        /// Sprite strip image
        #[arg(long)]
        sprite: PathBuf,
    },
}

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join(LOG_FILE);
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join(LOG_FILE);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    let cli = Cli::parse();

    if let Err(e) = paths::ensure_directories() {
        eprintln!("Failed to create log directory: {}", e);
    }

    let config = load_config(cli.config.as_deref());

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config),
        Command::Solve { background, sprite } => solve_offline(&config, &background, &sprite),
    };

    if let Err(e) = result {
        log(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}

fn run(config: &AppConfig) -> Result<()> {
    log("------------------------------------------------------------");
    log(&format!("Rainyun check-in v{}", env!("CARGO_PKG_VERSION")));
    log("------------------------------------------------------------");

    checkin::run_checkin(config)?;
    log("Check-in completed successfully");
    Ok(())
}

/// Runs split → gate → detect → match → validate on images saved to disk.
fn solve_offline(config: &AppConfig, background: &Path, sprite: &Path) -> Result<()> {
    let captcha = &config.captcha;

    let encoded = std::fs::read(background)
        .with_context(|| format!("Failed to read {}", background.display()))?;
    let background = image::load_from_memory(&encoded)
        .context("Background is not an image")?
        .to_luma8();
    let strip = image::open(sprite)
        .with_context(|| format!("Failed to open {}", sprite.display()))?
        .to_luma8();
    let sprites = split_strip(&strip);

    let classifier = TesseractClassifier::locate(captcha.tesseract_path.as_deref())?;
    if let QualityCheck::Rejected { sprite, label } =
        check_quality(&sprites, &classifier, &captcha.sentinel_labels)?
    {
        return Err(anyhow!(
            "Sprite {} rendered as placeholder {:?}",
            sprite,
            label
        ));
    }

    let detector = CommandDetector::from_command(&captcha.detector_command)?;
    let regions = detector.detect(&encoded)?;
    log(&format!("Detected {} regions", regions.len()));

    let matches = match_sprites(
        &GradientFeatures::default(),
        &sprites,
        &background,
        &regions,
        captcha.ratio_threshold,
        captcha.scratch_dir.as_deref(),
    );
    let assignment = Assignment::from_matches(&matches)?;

    for (i, (target, best)) in assignment.targets().iter().zip(matches.iter()).enumerate() {
        let score = best.map(|m| m.score).unwrap_or_default();
        println!("sprite {}: {} (score {:.3})", i + 1, target, score);
    }
    Ok(())
}
