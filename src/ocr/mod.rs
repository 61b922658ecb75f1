pub mod engine;
pub mod setup;

pub use engine::TesseractClassifier;
