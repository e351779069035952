//! Knowledge mapping: category → static clinical record, confidence → severity.
//!
//! The knowledge base is built once on first use and shared read-only.
//! `enrich` is a pure function of each finding's category and confidence.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::detection::{Category, Finding};
use super::AnalysisError;

// ─── Types ────────────────────────────────────────────────────────────────────

/// Reference data for one category. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecord {
    pub explanation: String,
    pub symptoms: Vec<String>,
    pub complications: Vec<String>,
    pub specialists: Vec<String>,
    pub tests: Vec<String>,
    pub treatments: Vec<String>,
    pub lifestyle: Vec<String>,
}

/// Severity tier derived from confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mild => "Mild",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A finding joined with its clinical record and severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFinding {
    #[serde(flatten)]
    pub finding: Finding,
    pub severity: Severity,
    #[serde(flatten)]
    pub record: ClinicalRecord,
}

// ─── Severity ─────────────────────────────────────────────────────────────────

/// Ascending inclusive lower bounds. The highest threshold not exceeding the
/// confidence wins.
const SEVERITY_THRESHOLDS: [(f64, Severity); 3] = [
    (70.0, Severity::Mild),
    (80.0, Severity::Moderate),
    (90.0, Severity::Severe),
];

/// Map a confidence percentage to its tier. Below every threshold → `Mild`.
pub fn severity_for(confidence: f64) -> Severity {
    SEVERITY_THRESHOLDS
        .iter()
        .fold(Severity::Mild, |acc, &(threshold, tier)| {
            if confidence >= threshold {
                tier
            } else {
                acc
            }
        })
}

// ─── Knowledge base ───────────────────────────────────────────────────────────

/// Category → clinical record lookup.
#[derive(Debug)]
pub struct KnowledgeBase {
    records: HashMap<Category, ClinicalRecord>,
}

static KNOWLEDGE_BASE: LazyLock<KnowledgeBase> = LazyLock::new(KnowledgeBase::builtin);

impl KnowledgeBase {
    /// The process-wide shared instance.
    pub fn global() -> &'static KnowledgeBase {
        &KNOWLEDGE_BASE
    }

    fn builtin() -> Self {
        let records = HashMap::from([
            (
                Category::Fracture,
                record(
                    "A break or crack in the bone structure",
                    &["Pain", "Swelling", "Limited mobility", "Visible deformity"],
                    &["Improper healing", "Joint problems", "Chronic pain"],
                    &["Orthopedic Surgeon", "Physical Therapist"],
                    &["X-ray", "CT scan", "MRI"],
                    &["Immobilization", "Surgery", "Physical therapy"],
                    &["Rest affected area", "Follow rehabilitation plan", "Maintain proper nutrition"],
                ),
            ),
            (
                Category::Mass,
                record(
                    "An abnormal growth or cluster of cells",
                    &["Pain", "Swelling", "Changes in surrounding tissue"],
                    &["Pressure on nearby structures", "Potential malignancy"],
                    &["Oncologist", "Radiologist", "Surgeon"],
                    &["Biopsy", "PET scan", "Blood tests"],
                    &["Surgery", "Radiation therapy", "Chemotherapy"],
                    &["Regular medical check-ups", "Healthy diet", "Stress management"],
                ),
            ),
            (
                Category::Inflammation,
                record(
                    "Tissue response to injury or infection",
                    &["Pain", "Swelling", "Redness", "Heat"],
                    &["Chronic pain", "Tissue damage", "Reduced function"],
                    &["Rheumatologist", "Physical Therapist"],
                    &["Blood tests", "Ultrasound", "MRI"],
                    &["Anti-inflammatory medication", "Physical therapy", "Rest"],
                    &["Regular exercise", "Anti-inflammatory diet", "Stress reduction"],
                ),
            ),
        ]);
        Self { records }
    }

    /// Record for `category`. The built-in table covers every category, so
    /// the error only fires if the table and the enum drift apart.
    pub fn lookup(&self, category: Category) -> Result<&ClinicalRecord, AnalysisError> {
        self.records
            .get(&category)
            .ok_or_else(|| AnalysisError::UnknownCategory(category.to_string()))
    }

    /// Record by category name, e.g. from a presentation-layer request.
    pub fn lookup_name(&self, name: &str) -> Result<&ClinicalRecord, AnalysisError> {
        self.lookup(name.parse()?)
    }

    /// Join one finding with its record and severity.
    pub fn enrich_one(&self, finding: &Finding) -> Result<EnrichedFinding, AnalysisError> {
        Ok(EnrichedFinding {
            finding: finding.clone(),
            severity: severity_for(finding.confidence),
            record: self.lookup(finding.category)?.clone(),
        })
    }
}

fn record(
    explanation: &str,
    symptoms: &[&str],
    complications: &[&str],
    specialists: &[&str],
    tests: &[&str],
    treatments: &[&str],
    lifestyle: &[&str],
) -> ClinicalRecord {
    ClinicalRecord {
        explanation: explanation.into(),
        symptoms: owned(symptoms),
        complications: owned(complications),
        specialists: owned(specialists),
        tests: owned(tests),
        treatments: owned(treatments),
        lifestyle: owned(lifestyle),
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Enrich every finding, preserving order. Fails on the first unknown category.
pub fn enrich(findings: &[Finding]) -> Result<Vec<EnrichedFinding>, AnalysisError> {
    let kb = KnowledgeBase::global();
    findings.iter().map(|f| kb.enrich_one(f)).collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(category: Category, confidence: f64) -> Finding {
        Finding {
            x: 1.0,
            y: 2.0,
            category,
            confidence,
        }
    }

    #[test]
    fn severity_boundaries_resolve_upward() {
        assert_eq!(severity_for(70.0), Severity::Mild);
        assert_eq!(severity_for(79.999), Severity::Mild);
        assert_eq!(severity_for(80.0), Severity::Moderate);
        assert_eq!(severity_for(89.999), Severity::Moderate);
        assert_eq!(severity_for(90.0), Severity::Severe);
        assert_eq!(severity_for(99.99), Severity::Severe);
    }

    #[test]
    fn severity_below_all_thresholds_defaults_to_mild() {
        assert_eq!(severity_for(0.0), Severity::Mild);
        assert_eq!(severity_for(69.9), Severity::Mild);
    }

    #[test]
    fn severity_orders_by_tier() {
        assert!(Severity::Mild < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Severe);
    }

    #[test]
    fn every_category_has_a_record() {
        let kb = KnowledgeBase::global();
        for category in Category::ALL {
            let record = kb.lookup(category).unwrap();
            assert!(!record.explanation.is_empty());
            assert!(!record.symptoms.is_empty());
            assert!(!record.tests.is_empty());
            assert!(!record.specialists.is_empty());
            assert!(!record.treatments.is_empty());
            assert!(!record.lifestyle.is_empty());
        }
    }

    #[test]
    fn fracture_record_contents() {
        let record = KnowledgeBase::global().lookup(Category::Fracture).unwrap();
        assert_eq!(record.explanation, "A break or crack in the bone structure");
        assert_eq!(record.specialists, vec!["Orthopedic Surgeon", "Physical Therapist"]);
        assert_eq!(record.symptoms.len(), 4);
    }

    #[test]
    fn lookup_by_unknown_name_fails() {
        let err = KnowledgeBase::global().lookup_name("sprain").unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownCategory(_)));
    }

    #[test]
    fn enrich_preserves_order_and_count() {
        let input = vec![
            finding(Category::Mass, 95.0),
            finding(Category::Fracture, 71.0),
            finding(Category::Inflammation, 80.0),
        ];
        let out = enrich(&input).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].finding.category, Category::Mass);
        assert_eq!(out[0].severity, Severity::Severe);
        assert_eq!(out[1].severity, Severity::Mild);
        assert_eq!(out[2].severity, Severity::Moderate);
        assert_eq!(out[2].record.explanation, "Tissue response to injury or infection");
    }

    #[test]
    fn enrich_is_deterministic() {
        let input = vec![finding(Category::Fracture, 85.0)];
        assert_eq!(enrich(&input).unwrap(), enrich(&input).unwrap());
    }

    #[test]
    fn enrich_empty_is_empty() {
        assert!(enrich(&[]).unwrap().is_empty());
    }

    #[test]
    fn enriched_finding_serializes_flat() {
        let out = enrich(&[finding(Category::Fracture, 85.0)]).unwrap();
        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(json["type"], "fracture");
        assert_eq!(json["severity"], "Moderate");
        assert_eq!(json["tests"][0], "X-ray");
    }
}
