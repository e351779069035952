use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::detection::SynthesisConfig;
use crate::pipeline::enhance::EnhanceConfig;
use crate::pipeline::heatmap::HeatmapStyle;
use crate::pipeline::report::LayoutConfig;

/// Application-level constants
pub const APP_NAME: &str = "HealthyFox";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name used when the report is exported.
pub const REPORT_FILE_NAME: &str = "medical-analysis-report.pdf";

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "healthyfox_lib=info,warn"
}

/// Directory the report lands in when the caller does not pick one.
/// Downloads folder, falling back to home, then the working directory.
pub fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Settings for every pipeline stage. Defaults reproduce the reference
/// behaviour; any subset can be overridden from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enhance: EnhanceConfig,
    pub synthesis: SynthesisConfig,
    pub heatmap: HeatmapStyle,
    pub layout: LayoutConfig,
}

impl AnalysisConfig {
    /// Parse a (possibly partial) JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
