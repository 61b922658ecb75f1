//! Icon-click captcha solver.
//!
//! The captcha shows a background scene and a strip of three reference
//! sprites; the user must click the matching pieces in the scene in sprite
//! order. The pipeline:
//! - `acquire`: read the page and download both images
//! - `sprite`: split the strip and reject badly rendered captchas
//! - `region`: locate candidate pieces in the scene
//! - `features` / `matcher`: score every piece against every sprite
//! - `assignment`: make sure each sprite got its own piece
//! - `coords`: turn image pixels into click offsets
//! - `solver`: the state machine driving it all, with reload-and-retry

pub mod acquire;
pub mod assignment;
pub mod coords;
pub mod features;
pub mod matcher;
pub mod region;
pub mod solver;
pub mod sprite;

pub use acquire::ImageFetcher;
pub use features::GradientFeatures;
pub use region::CommandDetector;
pub use solver::{SolverContext, solve_captcha};
