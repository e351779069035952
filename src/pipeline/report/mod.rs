//! Paginated analysis report.
//!
//! Two steps, kept apart so pagination is testable without parsing PDF:
//! 1. `layout`: positions every text/image block on pages (top-down mm)
//! 2. `pdf`: draws a laid-out `Document` with `printpdf` and saves it
//!
//! The document is built once per export request and dropped afterwards.

pub mod layout;
pub mod pdf;

pub use layout::*;
pub use pdf::*;

use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::enhance::ProcessedImage;
use super::knowledge::EnrichedFinding;
use super::ReportError;

// ═══════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════

/// When the page-bottom threshold is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageBreakPolicy {
    /// Only before each finding block. Long blocks may run past the page edge.
    PerBlock,
    /// Before each finding block and before every line inside it.
    PerLine,
}

/// Page geometry and typography. All lengths in millimetres, measured from
/// the top-left corner; font sizes in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_left: f32,
    /// X of severity lines, paragraph lines and list items.
    pub indent_left: f32,
    /// Cursor position after a page break.
    pub top_margin: f32,
    /// A cursor beyond this forces a new page.
    pub page_bottom: f32,
    pub title_y: f32,
    pub date_y: f32,
    pub image_x: f32,
    pub image_y: f32,
    pub image_width: f32,
    pub image_height: f32,
    /// Cursor where the first finding starts, below the image.
    pub first_block_y: f32,
    /// Width explanation paragraphs are wrapped to.
    pub content_width: f32,
    pub line_height: f32,
    /// Advance after the finding header and after the severity line.
    pub header_advance: f32,
    pub section_gap: f32,
    /// Gap after the last section of a finding.
    pub block_gap: f32,
    pub title_size: f32,
    pub date_size: f32,
    pub header_size: f32,
    pub label_size: f32,
    pub body_size: f32,
    /// Average glyph advance as a fraction of the font size (Helvetica ≈ 0.5).
    pub avg_glyph_em: f32,
    pub page_break: PageBreakPolicy,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            margin_left: 20.0,
            indent_left: 25.0,
            top_margin: 20.0,
            page_bottom: 270.0,
            title_y: 20.0,
            date_y: 30.0,
            image_x: 20.0,
            image_y: 40.0,
            image_width: 170.0,
            image_height: 100.0,
            first_block_y: 150.0,
            content_width: 170.0,
            line_height: 7.0,
            header_advance: 10.0,
            section_gap: 5.0,
            block_gap: 15.0,
            title_size: 20.0,
            date_size: 12.0,
            header_size: 14.0,
            label_size: 12.0,
            body_size: 10.0,
            avg_glyph_em: 0.5,
            page_break: PageBreakPolicy::PerBlock,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Document model
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// What a text block is, so callers can find headers without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    Title,
    Date,
    FindingHeader,
    SeverityLine,
    SectionLabel,
    Paragraph,
    ListItem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub role: BlockRole,
    pub text: String,
    pub x: f32,
    /// Baseline, from the top of the page.
    pub y: f32,
    pub font_size: f32,
    pub weight: FontWeight,
    pub color: [u8; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub x: f32,
    /// Top edge, from the top of the page.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub image: DynamicImage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text(TextBlock),
    Image(ImageBlock),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn text_blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Text(t) => Some(t),
            Block::Image(_) => None,
        })
    }
}

/// Laid-out report. Always holds at least one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Every text block with the index of the page it sits on.
    pub fn text_blocks(&self) -> impl Iterator<Item = (usize, &TextBlock)> {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(i, page)| page.text_blocks().map(move |t| (i, t)))
    }

    /// Finding headers in document order.
    pub fn finding_headers(&self) -> Vec<(usize, &TextBlock)> {
        self.text_blocks()
            .filter(|(_, t)| t.role == BlockRole::FindingHeader)
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════
// Export
// ═══════════════════════════════════════════════════════════

/// Lay out, render and save the report into `dir`.
///
/// Any failure aborts before the target file is touched.
pub fn export_report(
    findings: &[EnrichedFinding],
    image: &ProcessedImage,
    config: &LayoutConfig,
    dir: &Path,
) -> Result<PathBuf, ReportError> {
    let document = assemble(findings, image, config)?;
    let bytes = render_pdf(&document, config)?;
    let path = export_pdf_to_file(&bytes, dir)?;

    info!(
        path = %path.display(),
        pages = document.page_count(),
        findings = findings.len(),
        "Report exported"
    );

    Ok(path)
}
