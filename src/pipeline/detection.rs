//! Finding synthesis: the stand-in detector.
//!
//! Produces 1-3 plausible findings from image dimensions alone. The random
//! source is injected so runs are reproducible under a fixed seed, and the
//! trait boundary lets a real detector replace it without touching the
//! processor.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AnalysisError;

// ─── Types ────────────────────────────────────────────────────────────────────

/// Anomaly category. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Fracture,
    Mass,
    Inflammation,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Fracture, Category::Mass, Category::Inflammation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fracture => "fracture",
            Self::Mass => "mass",
            Self::Inflammation => "inflammation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AnalysisError::UnknownCategory(s.to_string()))
    }
}

/// One synthesized spatial anomaly candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Horizontal position in image pixels, `[0, width)`.
    pub x: f64,
    /// Vertical position in image pixels, `[0, height)`.
    pub y: f64,
    #[serde(rename = "type")]
    pub category: Category,
    /// Percentage, `[70, 100)` with the default config.
    pub confidence: f64,
}

/// Bounds for the synthesizer's draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub min_findings: usize,
    pub max_findings: usize,
    /// Inclusive lower bound of confidence.
    pub min_confidence: f64,
    /// Exclusive upper bound of confidence.
    pub max_confidence: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            min_findings: 1,
            max_findings: 3,
            min_confidence: 70.0,
            max_confidence: 100.0,
        }
    }
}

// ─── Service trait ────────────────────────────────────────────────────────────

/// Produces findings for an image of the given size.
pub trait FindingSynthesizer: Send {
    fn synthesize(&mut self, width: u32, height: u32) -> Vec<Finding>;
}

/// Uniform random findings drawn from an injected generator.
pub struct RandomFindingSynthesizer<R: Rng + Send = StdRng> {
    rng: R,
    config: SynthesisConfig,
}

impl<R: Rng + Send> RandomFindingSynthesizer<R> {
    pub fn new(rng: R, config: SynthesisConfig) -> Self {
        Self { rng, config }
    }
}

impl RandomFindingSynthesizer<StdRng> {
    /// Reproducible synthesizer for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed), SynthesisConfig::default())
    }

    /// Entropy-seeded synthesizer for production runs.
    pub fn from_entropy(config: SynthesisConfig) -> Self {
        Self::new(StdRng::from_entropy(), config)
    }
}

impl<R: Rng + Send> FindingSynthesizer for RandomFindingSynthesizer<R> {
    fn synthesize(&mut self, width: u32, height: u32) -> Vec<Finding> {
        let min = self.config.min_findings.max(1);
        let max = self.config.max_findings.max(min);
        let count = self.rng.gen_range(min..=max);
        let (w, h) = (width.max(1) as f64, height.max(1) as f64);
        let (lo, hi) = (self.config.min_confidence, self.config.max_confidence);

        let findings: Vec<Finding> = (0..count)
            .map(|_| Finding {
                x: self.rng.gen_range(0.0..w),
                y: self.rng.gen_range(0.0..h),
                category: Category::ALL[self.rng.gen_range(0..Category::ALL.len())],
                confidence: if hi > lo { self.rng.gen_range(lo..hi) } else { lo },
            })
            .collect();

        debug!(
            size = format!("{width}x{height}"),
            count = findings.len(),
            "Findings synthesized"
        );

        findings
    }
}

/// Returns the same findings on every call. Used to pin a run's output.
#[derive(Debug, Clone)]
pub struct FixedFindingSynthesizer {
    findings: Vec<Finding>,
}

impl FixedFindingSynthesizer {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self { findings }
    }
}

impl FindingSynthesizer for FixedFindingSynthesizer {
    fn synthesize(&mut self, _width: u32, _height: u32) -> Vec<Finding> {
        self.findings.clone()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
