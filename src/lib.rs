pub mod config;
pub mod pipeline; // Enhance → synthesize → heatmap → enrich → report

pub use config::AnalysisConfig;
pub use pipeline::processor::{
    build_pipeline, spawn_analysis, AnalysisHandle, AnalysisOutcome, AnalysisPipeline,
    AnalysisSession, ProgressTicker,
};
pub use pipeline::{AnalysisError, ReportError};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, filtered by `RUST_LOG` or
/// `config::default_log_filter()`. Meant for the host binary; calling it
/// again is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
