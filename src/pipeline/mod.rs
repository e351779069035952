pub mod import;
pub mod enhance;
pub mod detection;
pub mod heatmap;
pub mod knowledge;
pub mod report;
pub mod processor; // Sequential run + completion event + cosmetic progress

use thiserror::Error;

/// Failures that abort an analysis run. Surfaced to the user as
/// "analysis failed"; no partial artifacts are produced.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Unknown finding category: {0}")]
    UnknownCategory(String),

    #[error("Analysis worker stopped: {0}")]
    Interrupted(String),
}

/// Failures while building or saving the report. Surfaced as
/// "export failed"; nothing is written to disk.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("No completed analysis to export")]
    NoAnalysis,

    #[error("Cannot embed processed image: {0}")]
    ImageEmbed(String),

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
