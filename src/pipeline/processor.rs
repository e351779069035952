//! Analysis orchestrator.
//!
//! Drives one run per upload: decode → enhance → synthesize → heatmap →
//! enrich. Stages run sequentially; each consumes the previous stage's full
//! output.
//!
//! Uses trait-based DI for the enhancer and the synthesizer so runs are
//! reproducible in tests. Presentation concerns (progress bars, toasts) stay
//! outside; the async surface only exposes a completion event and an
//! independent cosmetic progress counter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::detection::{FindingSynthesizer, RandomFindingSynthesizer};
use super::enhance::{decode_upload, ImageEnhancer, LinearGainEnhancer, ProcessedImage};
use super::heatmap::{self, HeatmapLayer, HeatmapStyle};
use super::import::UploadedImage;
use super::knowledge::{enrich, EnrichedFinding};
use super::report::{self, Document, LayoutConfig};
use super::{AnalysisError, ReportError};
use crate::config::AnalysisConfig;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Everything one run produced. Owned by the run; the next run replaces it.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub run_id: Uuid,
    pub file_name: String,
    pub processed: ProcessedImage,
    pub heatmap: HeatmapLayer,
    pub findings: Vec<EnrichedFinding>,
}

impl AnalysisOutcome {
    /// Completion message shown to the user.
    pub fn summary(&self) -> String {
        format!("Detected {} potential conditions.", self.findings.len())
    }

    /// Lay out the report for this outcome, dated today.
    pub fn build_report(&self, layout: &LayoutConfig) -> Result<Document, ReportError> {
        report::assemble(&self.findings, &self.processed, layout)
    }

    /// Render and save the report into `dir`.
    pub fn export_report(&self, layout: &LayoutConfig, dir: &Path) -> Result<PathBuf, ReportError> {
        report::export_report(&self.findings, &self.processed, layout, dir)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs the analysis stages for one upload at a time.
pub struct AnalysisPipeline {
    enhancer: Box<dyn ImageEnhancer>,
    synthesizer: Box<dyn FindingSynthesizer>,
    style: HeatmapStyle,
}

impl AnalysisPipeline {
    pub fn new(
        enhancer: Box<dyn ImageEnhancer>,
        synthesizer: Box<dyn FindingSynthesizer>,
        style: HeatmapStyle,
    ) -> Self {
        Self {
            enhancer,
            synthesizer,
            style,
        }
    }

    /// Full run for one upload. Any stage failure aborts the run and
    /// nothing from it is returned.
    pub fn analyze(&mut self, upload: &UploadedImage) -> Result<AnalysisOutcome, AnalysisError> {
        let run_id = Uuid::new_v4();

        tracing::info!(
            run_id = %run_id,
            file = %upload.file_name,
            bytes = upload.bytes.len(),
            "Analysis: starting"
        );

        let raw = decode_upload(upload)?;
        let processed = self.enhancer.enhance(&raw)?;
        let findings = self
            .synthesizer
            .synthesize(processed.width, processed.height);
        let heatmap = heatmap::render(processed.width, processed.height, &findings, &self.style);
        let findings = enrich(&findings)?;

        tracing::info!(
            run_id = %run_id,
            size = format!("{}x{}", processed.width, processed.height),
            findings = findings.len(),
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            run_id,
            file_name: upload.file_name.clone(),
            processed,
            heatmap,
            findings,
        })
    }
}

/// Build a pipeline with production implementations: linear-gain enhancer
/// and an entropy-seeded random synthesizer.
pub fn build_pipeline(config: &AnalysisConfig) -> AnalysisPipeline {
    AnalysisPipeline::new(
        Box::new(LinearGainEnhancer::new(config.enhance.clone())),
        Box::new(RandomFindingSynthesizer::from_entropy(
            config.synthesis.clone(),
        )),
        config.heatmap.clone(),
    )
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Holds the latest completed outcome between the analysis and export
/// requests of the presentation layer.
pub struct AnalysisSession {
    pipeline: AnalysisPipeline,
    layout: LayoutConfig,
    latest: Option<AnalysisOutcome>,
}

impl AnalysisSession {
    pub fn new(pipeline: AnalysisPipeline, layout: LayoutConfig) -> Self {
        Self {
            pipeline,
            layout,
            latest: None,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(build_pipeline(config), config.layout.clone())
    }

    /// Start a new run. The previous outcome is discarded first, so a
    /// failed run leaves nothing to export.
    pub fn analyze(&mut self, upload: &UploadedImage) -> Result<&AnalysisOutcome, AnalysisError> {
        self.latest = None;
        let outcome = self.pipeline.analyze(upload)?;
        Ok(self.latest.insert(outcome))
    }

    pub fn latest(&self) -> Option<&AnalysisOutcome> {
        self.latest.as_ref()
    }

    /// Export the report for the latest outcome into `dir`.
    pub fn export(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        let outcome = self.latest.as_ref().ok_or(ReportError::NoAnalysis)?;
        outcome.export_report(&self.layout, dir)
    }

    /// Drop the held outcome (e.g. when the user clears the upload).
    pub fn clear(&mut self) {
        self.latest = None;
    }
}

// ---------------------------------------------------------------------------
// Async surface
// ---------------------------------------------------------------------------

/// Fixed-interval cosmetic progress counter, capped at 100.
///
/// Unrelated to actual pipeline progress; never use it to sequence stages.
#[derive(Debug, Clone)]
pub struct ProgressTicker {
    pub step: u8,
    pub interval: Duration,
}

impl Default for ProgressTicker {
    fn default() -> Self {
        Self {
            step: 2,
            interval: Duration::from_millis(100),
        }
    }
}

impl ProgressTicker {
    /// Start ticking on the current runtime. Stops at 100 or once every
    /// receiver has been dropped.
    pub fn spawn(self) -> (watch::Receiver<u8>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(0u8);
        let step = self.step.max(1);
        let period = self.interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // Consume initial immediate tick

            let mut value = 0u8;
            while value < 100 {
                ticker.tick().await;
                value = value.saturating_add(step).min(100);
                if tx.send(value).is_err() {
                    break;
                }
            }
        });

        (rx, handle)
    }
}

/// Handle to a run in flight.
pub struct AnalysisHandle {
    /// Cosmetic progress, 0..=100.
    pub progress: watch::Receiver<u8>,
    /// Fires once with the real result.
    pub completion: oneshot::Receiver<Result<AnalysisOutcome, AnalysisError>>,
}

impl AnalysisHandle {
    /// Wait for the run to finish. Dropping the handle stops the ticker.
    pub async fn wait(self) -> Result<AnalysisOutcome, AnalysisError> {
        self.completion
            .await
            .map_err(|_| AnalysisError::Interrupted("worker exited without a result".into()))?
    }
}

/// Run `pipeline` on a blocking worker thread. Must be called from within a
/// tokio runtime. No cancellation: once started, the run completes.
pub fn spawn_analysis(mut pipeline: AnalysisPipeline, upload: UploadedImage) -> AnalysisHandle {
    spawn_analysis_with(ProgressTicker::default(), move || pipeline.analyze(&upload))
}

fn spawn_analysis_with<F>(ticker: ProgressTicker, run: F) -> AnalysisHandle
where
    F: FnOnce() -> Result<AnalysisOutcome, AnalysisError> + Send + 'static,
{
    let (progress, _ticker) = ticker.spawn();
    let (tx, completion) = oneshot::channel();

    tokio::task::spawn_blocking(move || {
        let result = run();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Analysis failed");
        }
        // Receiver gone means nobody is waiting for the result any more.
        let _ = tx.send(result);
    });

    AnalysisHandle {
        progress,
        completion,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
