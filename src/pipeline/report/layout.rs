//! Lays enriched findings out on fixed-size pages.
//!
//! Coordinates are millimetres from the top-left corner. A single vertical
//! cursor advances as blocks are placed; the page-break check runs before
//! each finding block, and with `PageBreakPolicy::PerLine` also before every
//! line inside it.

use chrono::{Local, NaiveDate};
use tracing::debug;

use super::{
    Block, BlockRole, Document, FontWeight, ImageBlock, LayoutConfig, Page, PageBreakPolicy,
    TextBlock,
};
use crate::pipeline::enhance::ProcessedImage;
use crate::pipeline::knowledge::EnrichedFinding;
use crate::pipeline::ReportError;

pub const REPORT_TITLE: &str = "Medical Image Analysis Report";

const BLACK: [u8; 3] = [0, 0, 0];
const GRAY: [u8; 3] = [100, 100, 100];

/// Points to millimetres.
const PT_TO_MM: f32 = 25.4 / 72.0;

/// Lay out the report dated today (local time).
pub fn assemble(
    findings: &[EnrichedFinding],
    image: &ProcessedImage,
    config: &LayoutConfig,
) -> Result<Document, ReportError> {
    assemble_on(findings, image, Local::now().date_naive(), config)
}

/// Lay out the report with an explicit date.
pub fn assemble_on(
    findings: &[EnrichedFinding],
    image: &ProcessedImage,
    date: NaiveDate,
    config: &LayoutConfig,
) -> Result<Document, ReportError> {
    // Embedded opaque: the PDF has no use for the alpha channel.
    let embedded = image::load_from_memory(&image.png_bytes)
        .map_err(|e| ReportError::ImageEmbed(format!("Cannot decode processed image: {e}")))?;
    let embedded = image::DynamicImage::ImageRgb8(embedded.to_rgb8());

    let mut writer = PageWriter::new(config);

    writer.place(text(
        BlockRole::Title,
        REPORT_TITLE,
        config.margin_left,
        config.title_y,
        config.title_size,
        FontWeight::Bold,
        BLACK,
    ));
    writer.place(text(
        BlockRole::Date,
        &format!("Date: {}", date.format("%Y-%m-%d")),
        config.margin_left,
        config.date_y,
        config.date_size,
        FontWeight::Regular,
        BLACK,
    ));
    writer.place(Block::Image(ImageBlock {
        x: config.image_x,
        y: config.image_y,
        width: config.image_width,
        height: config.image_height,
        image: embedded,
    }));
    writer.cursor = config.first_block_y;

    for (index, finding) in findings.iter().enumerate() {
        writer.break_if_past_bottom();
        write_finding(&mut writer, index, finding);
    }

    let document = Document {
        title: REPORT_TITLE.to_string(),
        pages: writer.finish(),
    };

    debug!(
        pages = document.page_count(),
        findings = findings.len(),
        "Report laid out"
    );

    Ok(document)
}

/// One finding block: header, severity, explanation, then the five lists.
fn write_finding(writer: &mut PageWriter<'_>, index: usize, finding: &EnrichedFinding) {
    let config = writer.config;

    writer.line(
        BlockRole::FindingHeader,
        &format!(
            "Finding {}: {}",
            index + 1,
            finding.finding.category.as_str().to_uppercase()
        ),
        config.margin_left,
        config.header_size,
        FontWeight::Bold,
        BLACK,
        config.header_advance,
    );
    writer.line(
        BlockRole::SeverityLine,
        &format!(
            "Severity: {} ({:.1}% confidence)",
            finding.severity, finding.finding.confidence
        ),
        config.indent_left,
        config.label_size,
        FontWeight::Regular,
        GRAY,
        config.header_advance,
    );

    writer.label("Medical Explanation:");
    let max_chars = max_chars_per_line(config.content_width, config.body_size, config.avg_glyph_em);
    for line in wrap_text(&finding.record.explanation, max_chars) {
        writer.line(
            BlockRole::Paragraph,
            &line,
            config.indent_left,
            config.body_size,
            FontWeight::Regular,
            BLACK,
            config.line_height,
        );
    }

    let record = &finding.record;
    let sections: [(&str, &[String]); 5] = [
        ("Symptoms:", &record.symptoms),
        ("Recommended Tests:", &record.tests),
        ("Specialists to Consult:", &record.specialists),
        ("Treatment Options:", &record.treatments),
        ("Lifestyle Recommendations:", &record.lifestyle),
    ];
    let last = sections.len() - 1;

    for (i, (label, items)) in sections.iter().enumerate() {
        writer.label(label);
        for item in items.iter() {
            writer.line(
                BlockRole::ListItem,
                &format!("• {item}"),
                config.indent_left,
                config.body_size,
                FontWeight::Regular,
                BLACK,
                config.line_height,
            );
        }
        writer.cursor += if i == last {
            config.block_gap
        } else {
            config.section_gap
        };
    }
}

// ─── Page writer ──────────────────────────────────────────────────────────────

struct PageWriter<'a> {
    config: &'a LayoutConfig,
    pages: Vec<Page>,
    cursor: f32,
}

impl<'a> PageWriter<'a> {
    fn new(config: &'a LayoutConfig) -> Self {
        Self {
            config,
            pages: vec![Page::default()],
            cursor: config.top_margin,
        }
    }

    fn place(&mut self, block: Block) {
        if let Some(page) = self.pages.last_mut() {
            page.blocks.push(block);
        }
    }

    fn break_if_past_bottom(&mut self) {
        if self.cursor > self.config.page_bottom {
            self.pages.push(Page::default());
            self.cursor = self.config.top_margin;
        }
    }

    /// Place one text line at the cursor, then advance by `advance`.
    #[allow(clippy::too_many_arguments)]
    fn line(
        &mut self,
        role: BlockRole,
        content: &str,
        x: f32,
        font_size: f32,
        weight: FontWeight,
        color: [u8; 3],
        advance: f32,
    ) {
        if self.config.page_break == PageBreakPolicy::PerLine && role != BlockRole::FindingHeader {
            self.break_if_past_bottom();
        }
        let y = self.cursor;
        self.place(text(role, content, x, y, font_size, weight, color));
        self.cursor += advance;
    }

    fn label(&mut self, content: &str) {
        let config = self.config;
        self.line(
            BlockRole::SectionLabel,
            content,
            config.margin_left,
            config.label_size,
            FontWeight::Regular,
            BLACK,
            config.line_height,
        );
    }

    fn finish(self) -> Vec<Page> {
        self.pages
    }
}

fn text(
    role: BlockRole,
    content: &str,
    x: f32,
    y: f32,
    font_size: f32,
    weight: FontWeight,
    color: [u8; 3],
) -> Block {
    Block::Text(TextBlock {
        role,
        text: content.to_string(),
        x,
        y,
        font_size,
        weight,
        color,
    })
}

// ─── Text wrapping ────────────────────────────────────────────────────────────

/// Characters that fit on one line of `width_mm` at `font_size` points.
pub fn max_chars_per_line(width_mm: f32, font_size: f32, avg_glyph_em: f32) -> usize {
    let glyph_mm = font_size * PT_TO_MM * avg_glyph_em;
    if glyph_mm <= 0.0 {
        return usize::MAX;
    }
    ((width_mm / glyph_mm).floor() as usize).max(1)
}

/// Greedy word wrap. Never returns an empty list; words longer than
/// `max_chars` get a line of their own.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len + word_len + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

// ─── Tests ────────────────────────────────────────────────────────────────────
